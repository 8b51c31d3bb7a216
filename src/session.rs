// src/session.rs - Drives one sewing session over a transport
//
// Idle -> StepperEnabled -> (WaitColorConfirm -> PerStitch ...)* -> StepperDisabled -> Done
//
// Strictly one command in flight: every record is written, flushed and
// acknowledged before the next one is built.
use async_trait::async_trait;
use thiserror::Error;

use crate::communication::{Transport, TransportError};
use crate::config::{Config, RigConfig, SessionConfig, ZeroStepPolicy};
use crate::pes::palette::Color;
use crate::pes::pattern::{MachineOffset, Pattern, Stitch};
use crate::protocol::command::{Command, CommandKind};
use crate::protocol::encoder::{ArithmeticError, Axis, CommandEncoder, MotorPhase};

/// First byte of a response that means "busy, the real answer follows".
const BUSY_MARKER: u8 = b'!';

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Block {block}, stitch {stitch}: {source}")]
    Arithmetic {
        block: usize,
        stitch: usize,
        #[source]
        source: ArithmeticError,
    },
    #[error("Stopped by the operator before block {block}")]
    Aborted { block: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    StepperEnabled,
    WaitColorConfirm { block: usize },
    PerStitch { block: usize, stitch: usize },
    StepperDisabled,
    Done,
}

/// Counters collected over a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub commands_sent: usize,
    pub busy_retries: usize,
    pub controller_errors: usize,
    pub skipped_phases: usize,
    pub blocks: usize,
    pub stitches: usize,
    pub jump_stitches: usize,
}

/// Thread change hook, called before every block.
///
/// Implementations show the color to the operator and return once the
/// machine is rethreaded, or fail to end the session.
#[async_trait]
pub trait ColorCheckpoint: Send {
    async fn color_change(&mut self, block: usize, color: &'static Color) -> Result<(), SessionError>;
}

/// Continues immediately at every color change.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl ColorCheckpoint for AutoConfirm {
    async fn color_change(&mut self, block: usize, color: &'static Color) -> Result<(), SessionError> {
        tracing::debug!("Block {} uses {}, continuing without confirmation", block, color);
        Ok(())
    }
}

pub struct Session<'a, T: Transport + ?Sized, C: ColorCheckpoint + ?Sized> {
    transport: &'a mut T,
    checkpoint: &'a mut C,
    rig: RigConfig,
    config: SessionConfig,
    encoder: CommandEncoder,
    state: SessionState,
    report: SessionReport,
}

impl<'a, T: Transport + ?Sized, C: ColorCheckpoint + ?Sized> Session<'a, T, C> {
    pub fn new(
        transport: &'a mut T,
        checkpoint: &'a mut C,
        rig: &RigConfig,
        config: &SessionConfig,
        offset: MachineOffset,
    ) -> Self {
        Self {
            transport,
            checkpoint,
            rig: rig.clone(),
            config: config.clone(),
            encoder: CommandEncoder::new(rig, offset, config.magic),
            state: SessionState::Idle,
            report: SessionReport::default(),
        }
    }

    /// Session that shifts `pattern` into non-negative machine coordinates.
    pub fn for_pattern(transport: &'a mut T, checkpoint: &'a mut C, config: &Config, pattern: &Pattern) -> Self {
        Self::new(transport, checkpoint, &config.rig, &config.session, pattern.machine_offset())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// Sew `pattern`, whose speeds must already be planned.
    ///
    /// Any error ends the session where it happened; there is no resume, a
    /// failed session has to be restarted from the beginning.
    pub async fn run(&mut self, pattern: &Pattern) -> Result<SessionReport, SessionError> {
        let offset = self.encoder.offset();
        tracing::info!(
            "Starting session: {} blocks, {} stitches, machine offset ({}, {})",
            pattern.blocks.len(),
            pattern.stitch_count(),
            offset.x,
            offset.y
        );

        self.enable_steppers().await?;

        let total = pattern.blocks.len();
        for (block_index, block) in pattern.blocks.iter().enumerate() {
            self.state = SessionState::WaitColorConfirm { block: block_index };
            tracing::info!(
                "Block {}/{}: {} ({} stitches, {} jumps)",
                block_index + 1,
                total,
                block.color(),
                block.len(),
                block.jump_count()
            );
            self.checkpoint.color_change(block_index, block.color()).await?;

            for (stitch_index, stitch) in block.stitches.iter().enumerate() {
                self.state = SessionState::PerStitch { block: block_index, stitch: stitch_index };
                self.sew_stitch(block_index, stitch_index, stitch).await?;
            }
            self.report.blocks += 1;
        }

        self.disable_steppers().await?;
        self.state = SessionState::Done;
        tracing::info!(
            "Session done: {} commands, {} busy retries, {} controller errors, {} skipped phases",
            self.report.commands_sent,
            self.report.busy_retries,
            self.report.controller_errors,
            self.report.skipped_phases
        );
        Ok(self.report.clone())
    }

    async fn enable_steppers(&mut self) -> Result<(), SessionError> {
        let command = self.encoder.control(CommandKind::EnableSteppers);
        tracing::info!("Enabling steppers");
        self.transmit(&command).await?;
        let settle = self.config.enable_settle();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        self.await_response().await?;
        self.state = SessionState::StepperEnabled;
        Ok(())
    }

    async fn disable_steppers(&mut self) -> Result<(), SessionError> {
        let command = self.encoder.control(CommandKind::DisableSteppers);
        self.state = SessionState::StepperDisabled;
        tracing::info!("Disabling steppers");
        self.transmit(&command).await?;
        self.await_response().await
    }

    async fn sew_stitch(&mut self, block: usize, index: usize, stitch: &Stitch) -> Result<(), SessionError> {
        for phase in MotorPhase::for_stitch(stitch) {
            let ticks = phase.ticks(&self.rig);
            let command = match self.encoder.encode_move(stitch, ticks) {
                Ok(command) => command,
                Err(ArithmeticError::DivisionByZero { axis })
                    if axis != Axis::Motor && self.config.zero_step_policy == ZeroStepPolicy::SkipPhase =>
                {
                    tracing::warn!(
                        "Skipping {:?} phase of block {} stitch {} at ({}, {}): no {} steps to pace",
                        phase,
                        block,
                        index,
                        stitch.x,
                        stitch.y,
                        axis
                    );
                    self.report.skipped_phases += 1;
                    continue;
                }
                Err(source) => return Err(SessionError::Arithmetic { block, stitch: index, source }),
            };
            tracing::debug!(
                "#{} {:?} ({}, {}) speed {}: x {}@{}us y {}@{}us motor {}@{}us",
                command.index,
                phase,
                stitch.x,
                stitch.y,
                stitch.speed,
                command.x.step_count,
                command.x.step_interval,
                command.y.step_count,
                command.y.step_interval,
                command.motor.step_count,
                command.motor.step_interval
            );
            self.transmit(&command).await?;
            self.await_response().await?;
        }
        self.report.stitches += 1;
        if stitch.jump {
            self.report.jump_stitches += 1;
        }
        Ok(())
    }

    async fn transmit(&mut self, command: &Command) -> Result<(), SessionError> {
        self.transport.write(&command.to_bytes()).await?;
        self.transport.flush().await?;
        self.report.commands_sent += 1;
        Ok(())
    }

    /// Read one response; a busy marker means the real response follows and
    /// is read as well.
    async fn await_response(&mut self) -> Result<(), SessionError> {
        let wait = self.config.response_timeout();
        self.transport.wait_available(wait).await?;
        let response = self.transport.read();
        self.log_response(&response);

        if response.first() == Some(&BUSY_MARKER) {
            self.report.busy_retries += 1;
            self.transport.wait_available(wait).await?;
            let response = self.transport.read();
            self.log_response(&response);
        }
        Ok(())
    }

    fn log_response(&mut self, response: &[u8]) {
        let text = String::from_utf8_lossy(response);
        let text = text.trim_end();
        if text.starts_with("err") {
            self.report.controller_errors += 1;
            tracing::warn!("Controller: {}", text);
        } else if response.first() == Some(&BUSY_MARKER) {
            tracing::warn!("Controller busy: {}", text);
        } else {
            tracing::debug!("Controller: {}", text);
        }
    }
}
