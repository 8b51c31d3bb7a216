// src/communication/serial.rs - Serial port connection to the stepper controller
use serial2_tokio::SerialPort;

use crate::communication::{StreamTransport, TransportError};
use crate::config::SerialConfig;

pub type SerialTransport = StreamTransport<SerialPort>;

/// Open the configured serial port.
pub fn open_serial(config: &SerialConfig) -> Result<SerialTransport, TransportError> {
    tracing::info!("Opening {} at {} baud", config.port, config.baud);
    let port = SerialPort::open(&config.port, config.baud).map_err(|e| {
        tracing::error!("Failed to open serial port '{}': {}", config.port, e);
        TransportError::Io(e)
    })?;
    Ok(StreamTransport::new(port))
}

/// Serial ports present on this host.
pub fn available_ports() -> Vec<String> {
    match SerialPort::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.display().to_string()).collect(),
        Err(e) => {
            tracing::warn!("Could not enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}
