// src/error.rs - Crate-level error used by the binaries
use thiserror::Error;

use crate::communication::TransportError;
use crate::config::ConfigError;
use crate::pes::decoder::FormatError;
use crate::session::SessionError;

/// Everything that can stop a stitching run, from reading the file to the
/// last acknowledged command.
#[derive(Debug, Error)]
pub enum StitcherError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid PES file: {0}")]
    Format(#[from] FormatError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Session failed: {0}")]
    Session(#[from] SessionError),
}
