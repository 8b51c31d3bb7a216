// src/motion/kinematics.rs
use crate::config::RigConfig;
use crate::protocol::encoder::{ArithmeticError, Axis};

/// CoreXY hoop kinematics.
///
/// Both hoop motors drive both axes through a shared belt:
/// motor A follows X - Y, motor B follows X + Y. Positions are in file units
/// and converted to microstep ticks through the belt geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreXyKinematics {
    ticks_per_revolution: u32,
    distance_per_revolution: u32,
}

impl CoreXyKinematics {
    pub fn new(ticks_per_revolution: u32, distance_per_revolution: u32) -> Self {
        Self { ticks_per_revolution, distance_per_revolution }
    }

    pub fn from_rig(rig: &RigConfig) -> Self {
        Self::new(rig.ticks_per_revolution, rig.distance_per_revolution)
    }

    /// Absolute motor targets for a hoop position.
    pub fn hoop_to_motors(&self, x: i32, y: i32) -> Result<(i32, i32), ArithmeticError> {
        let a = self.to_ticks(x as i64 - y as i64, Axis::X)?;
        let b = self.to_ticks(x as i64 + y as i64, Axis::Y)?;
        Ok((a, b))
    }

    fn to_ticks(&self, distance: i64, axis: Axis) -> Result<i32, ArithmeticError> {
        if self.distance_per_revolution == 0 {
            return Err(ArithmeticError::DivisionByZero { axis });
        }
        let ticks = distance * 2 * self.ticks_per_revolution as i64 / self.distance_per_revolution as i64;
        i32::try_from(ticks).map_err(|_| ArithmeticError::Overflow { axis })
    }
}
