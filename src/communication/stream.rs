// src/communication/stream.rs - Transport over any async byte stream
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};

use crate::communication::{Transport, TransportError, has_line, take_line};

const READ_CHUNK: usize = 256;

/// Connection statistics
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub timeouts: u64,
}

/// [`Transport`] over a serial port or any other duplex async stream.
pub struct StreamTransport<S> {
    stream: S,
    rx_buffer: Vec<u8>,
    stats: StreamStats,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            rx_buffer: Vec::with_capacity(READ_CHUNK),
            stats: StreamStats::default(),
        }
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes).await?;
        self.stats.bytes_sent += bytes.len() as u64;
        tracing::trace!("Serial TX: {} bytes", bytes.len());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.stream.flush().await?;
        Ok(())
    }

    fn bytes_available(&self) -> usize {
        self.rx_buffer.len()
    }

    /// Replies may arrive split over several reads; keep reading until a
    /// whole line is buffered. `wait` bounds the total time, not each read.
    async fn wait_available(&mut self, wait: Duration) -> Result<usize, TransportError> {
        let deadline = Instant::now() + wait;
        let mut chunk = [0u8; READ_CHUNK];
        while !has_line(&self.rx_buffer) {
            match timeout_at(deadline, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) => return Err(TransportError::Closed),
                Ok(Ok(n)) => {
                    self.stats.bytes_received += n as u64;
                    self.rx_buffer.extend_from_slice(&chunk[..n]);
                    tracing::trace!("Serial RX: {} bytes", n);
                }
                Ok(Err(e)) => return Err(TransportError::Io(e)),
                Err(_) => {
                    self.stats.timeouts += 1;
                    tracing::debug!("Partial response at timeout: {:?}", String::from_utf8_lossy(&self.rx_buffer));
                    return Err(TransportError::Timeout { waited: wait });
                }
            }
        }
        Ok(self.rx_buffer.len())
    }

    fn read(&mut self) -> Vec<u8> {
        take_line(&mut self.rx_buffer)
    }
}
