// pes_stitcher: PES embroidery decoding and stepper command generation for a
// corexy hoop with a stepper-driven needle.

pub mod communication;
pub mod config;
pub mod error;
pub mod motion;
pub mod pes;
pub mod protocol;
pub mod session;

pub use crate::config::{Config, RigConfig, SessionConfig, SpeedProfile, ZeroStepPolicy};
pub use crate::error::StitcherError;
pub use crate::motion::speed_planner::plan_speeds;
pub use crate::pes::decoder::{FormatError, parse_pes};
pub use crate::pes::palette::{Color, ColorHandle, PALETTE};
pub use crate::pes::pattern::{Block, BoundingBox, MachineOffset, Pattern, Stitch};
pub use crate::protocol::command::{AxisMove, Command, CommandKind};
pub use crate::protocol::encoder::{ArithmeticError, Axis, CommandEncoder, MotorPhase};
pub use crate::session::{AutoConfirm, ColorCheckpoint, Session, SessionError, SessionReport, SessionState};
