// src/protocol/mod.rs - Wire protocol to the stepper controller
pub mod command;
pub mod encoder;

pub use command::{AxisMove, Command, CommandKind, WIRE_SIZE, WireError, checksum};
pub use encoder::{ArithmeticError, Axis, CommandEncoder, MotorPhase};
