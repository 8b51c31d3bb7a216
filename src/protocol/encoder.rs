// src/protocol/encoder.rs - Stitch to command conversion
use std::fmt;

use thiserror::Error;

use crate::config::RigConfig;
use crate::motion::kinematics::CoreXyKinematics;
use crate::pes::pattern::{MachineOffset, Stitch};
use crate::protocol::command::{AxisMove, Command, CommandKind};

const MICROS_PER_MINUTE: u64 = 60_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Motor,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Motor => write!(f, "motor"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("Division by zero computing the {axis} step interval")]
    DivisionByZero { axis: Axis },
    #[error("Value out of range for the {axis} axis")]
    Overflow { axis: Axis },
}

/// Portion of one stitch rotation a command turns the needle motor through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorPhase {
    /// Needle up, hoop moves to the stitch position.
    HoopMoving,
    /// Rest of the rotation with the hoop at rest.
    HoopNotMoving,
    /// Hoop travels to a jump stitch without turning the needle.
    JumpMove,
    /// One full rotation at the jump stitch position.
    JumpSettle,
}

impl MotorPhase {
    /// The two phases emitted for one stitch, in order.
    pub fn for_stitch(stitch: &Stitch) -> [MotorPhase; 2] {
        if stitch.jump {
            [MotorPhase::JumpMove, MotorPhase::JumpSettle]
        } else {
            [MotorPhase::HoopMoving, MotorPhase::HoopNotMoving]
        }
    }

    pub fn ticks(self, rig: &RigConfig) -> u32 {
        match self {
            MotorPhase::HoopMoving => rig.ticks_hoop_moving(),
            MotorPhase::HoopNotMoving => rig.ticks_hoop_not_moving(),
            MotorPhase::JumpMove => 0,
            MotorPhase::JumpSettle => rig.ticks_per_stitch,
        }
    }
}

/// Builds wire commands for one session.
///
/// Owns the command index counter and the coordinate offset, both of which
/// are fixed or only ever move forward while a session runs.
#[derive(Debug, Clone)]
pub struct CommandEncoder {
    kinematics: CoreXyKinematics,
    ticks_per_stitch: u32,
    offset: MachineOffset,
    magic: u32,
    next_index: u32,
}

impl CommandEncoder {
    pub fn new(rig: &RigConfig, offset: MachineOffset, magic: u32) -> Self {
        Self {
            kinematics: CoreXyKinematics::from_rig(rig),
            ticks_per_stitch: rig.ticks_per_stitch,
            offset,
            magic,
            next_index: 0,
        }
    }

    pub fn offset(&self) -> MachineOffset {
        self.offset
    }

    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Enable or disable record; these do not consume a command index.
    pub fn control(&self, kind: CommandKind) -> Command {
        Command::control(self.magic, kind)
    }

    /// Move the hoop to `stitch` while the needle motor turns `motor_ticks`.
    ///
    /// The hoop targets are absolute positions in machine coordinates. On
    /// error the index counter does not advance.
    pub fn encode_move(&mut self, stitch: &Stitch, motor_ticks: u32) -> Result<Command, ArithmeticError> {
        let x = stitch.x.checked_add(self.offset.x).ok_or(ArithmeticError::Overflow { axis: Axis::X })?;
        let y = stitch.y.checked_add(self.offset.y).ok_or(ArithmeticError::Overflow { axis: Axis::Y })?;
        let (x_steps, y_steps) = self.kinematics.hoop_to_motors(x, y)?;

        let motor_interval = self.motor_interval(stitch.speed)?;
        let motor_steps = i32::try_from(motor_ticks).map_err(|_| ArithmeticError::Overflow { axis: Axis::Motor })?;
        let time_span = motor_ticks as u64 * motor_interval as u64;

        let command = Command {
            magic: self.magic,
            index: self.next_index,
            x: AxisMove { step_count: x_steps, step_interval: axis_interval(time_span, x_steps, Axis::X)? },
            y: AxisMove { step_count: y_steps, step_interval: axis_interval(time_span, y_steps, Axis::Y)? },
            motor: AxisMove { step_count: motor_steps, step_interval: motor_interval },
            kind: CommandKind::Move,
        };
        self.next_index = self.next_index.wrapping_add(1);
        Ok(command)
    }

    /// Microseconds between two needle motor ticks at `speed` stitches per minute.
    fn motor_interval(&self, speed: u32) -> Result<u32, ArithmeticError> {
        let ticks_per_minute = speed as u64 * self.ticks_per_stitch as u64;
        if ticks_per_minute == 0 {
            return Err(ArithmeticError::DivisionByZero { axis: Axis::Motor });
        }
        u32::try_from(MICROS_PER_MINUTE / ticks_per_minute).map_err(|_| ArithmeticError::Overflow { axis: Axis::Motor })
    }
}

/// Spread `time_span` over the axis' steps. Step counts are signed targets;
/// only their magnitude paces the axis.
fn axis_interval(time_span: u64, steps: i32, axis: Axis) -> Result<u32, ArithmeticError> {
    if time_span == 0 {
        return Ok(0);
    }
    if steps == 0 {
        return Err(ArithmeticError::DivisionByZero { axis });
    }
    u32::try_from(time_span / steps.unsigned_abs() as u64).map_err(|_| ArithmeticError::Overflow { axis })
}
