// src/communication/mod.rs - Transport boundary between the session and the controller
pub mod serial;
pub mod simulated;
pub mod stream;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use serial::open_serial;
pub use simulated::SimulatedController;
pub use stream::StreamTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No response within {waited:?}")]
    Timeout { waited: Duration },
    #[error("Connection closed by the controller")]
    Closed,
}

/// Byte link to the stepper controller.
///
/// The session never owns the link's configuration; it only writes records
/// and reads responses. Apart from writing, `wait_available` is the only
/// call that suspends.
#[async_trait]
pub trait Transport: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    async fn flush(&mut self) -> Result<(), TransportError>;

    /// Bytes that can be read without waiting.
    fn bytes_available(&self) -> usize;

    /// Wait until a complete response line is buffered or `timeout` passes.
    /// Returns the number of bytes available.
    async fn wait_available(&mut self, timeout: Duration) -> Result<usize, TransportError>;

    /// Take the next complete response line, including its newline. Empty
    /// when no full line is buffered; a partial line stays buffered.
    fn read(&mut self) -> Vec<u8>;
}

/// Split off the first complete line of `buffer`.
pub(crate) fn take_line(buffer: &mut Vec<u8>) -> Vec<u8> {
    match buffer.iter().position(|&b| b == b'\n') {
        Some(end) => buffer.drain(..=end).collect(),
        None => Vec::new(),
    }
}

pub(crate) fn has_line(buffer: &[u8]) -> bool {
    buffer.contains(&b'\n')
}
