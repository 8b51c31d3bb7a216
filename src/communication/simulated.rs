// src/communication/simulated.rs - In-process stand-in for the stepper controller
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use crate::communication::{Transport, TransportError, take_line};
use crate::protocol::command::{Command, CommandKind, WIRE_SIZE, WireError};

/// Accepts wire records like the firmware does and answers each with one
/// line: `ok <index>` for moves, `ok enable` / `ok disable` for the driver
/// records, `err <reason>` otherwise. Records listed with
/// [`SimulatedController::with_busy_records`] are first answered with a `!`
/// busy marker.
#[derive(Debug)]
pub struct SimulatedController {
    magic: u32,
    pending_rx: Vec<u8>,
    outbox: VecDeque<Vec<u8>>,
    rx_buffer: Vec<u8>,
    busy_records: HashSet<usize>,
    records_seen: usize,
    enabled: bool,
    received: Vec<Command>,
    motor_ticks: u64,
    elapsed_us: u64,
    errors: usize,
}

impl SimulatedController {
    pub fn new(magic: u32) -> Self {
        Self {
            magic,
            pending_rx: Vec::new(),
            outbox: VecDeque::new(),
            rx_buffer: Vec::new(),
            busy_records: HashSet::new(),
            records_seen: 0,
            enabled: false,
            received: Vec::new(),
            motor_ticks: 0,
            elapsed_us: 0,
            errors: 0,
        }
    }

    /// Answer the records with these ordinals (0 = first record) with a busy marker first.
    pub fn with_busy_records(mut self, ordinals: impl IntoIterator<Item = usize>) -> Self {
        self.busy_records.extend(ordinals);
        self
    }

    /// Every valid record, in arrival order.
    pub fn received(&self) -> &[Command] {
        &self.received
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Needle motor ticks turned so far.
    pub fn motor_ticks(&self) -> u64 {
        self.motor_ticks
    }

    /// Sewing time implied by the motor intervals, in microseconds.
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    fn accept(&mut self, record: &[u8]) {
        let ordinal = self.records_seen;
        self.records_seen += 1;

        let reply = match self.execute(record) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!("Simulated controller rejected record {}: {}", ordinal, e);
                self.errors += 1;
                format!("err {}", e)
            }
        };
        if self.busy_records.contains(&ordinal) {
            self.outbox.push_back(b"!busy\n".to_vec());
        }
        self.outbox.push_back(format!("{}\n", reply).into_bytes());
    }

    fn execute(&mut self, record: &[u8]) -> Result<String, WireError> {
        let command = Command::from_bytes(record)?;
        if command.magic != self.magic {
            return Err(WireError::BadMagic { found: command.magic });
        }
        let reply = match command.kind {
            CommandKind::EnableSteppers => {
                self.enabled = true;
                "ok enable".to_string()
            }
            CommandKind::DisableSteppers => {
                self.enabled = false;
                "ok disable".to_string()
            }
            CommandKind::Move if !self.enabled => {
                self.errors += 1;
                return Ok("err steppers disabled".to_string());
            }
            CommandKind::Move => {
                let ticks = command.motor.step_count.max(0) as u64;
                self.motor_ticks += ticks;
                self.elapsed_us += ticks * command.motor.step_interval as u64;
                format!("ok {}", command.index)
            }
            CommandKind::None => "ok".to_string(),
        };
        self.received.push(command);
        Ok(reply)
    }
}

#[async_trait]
impl Transport for SimulatedController {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.pending_rx.extend_from_slice(bytes);
        while self.pending_rx.len() >= WIRE_SIZE {
            let record: Vec<u8> = self.pending_rx.drain(..WIRE_SIZE).collect();
            self.accept(&record);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn bytes_available(&self) -> usize {
        self.rx_buffer.len()
    }

    /// Responses are ready as soon as the record is written, so an empty
    /// outbox times out without waiting.
    async fn wait_available(&mut self, wait: Duration) -> Result<usize, TransportError> {
        if self.rx_buffer.is_empty() {
            match self.outbox.pop_front() {
                Some(line) => self.rx_buffer.extend(line),
                None => return Err(TransportError::Timeout { waited: wait }),
            }
        }
        Ok(self.rx_buffer.len())
    }

    fn read(&mut self) -> Vec<u8> {
        take_line(&mut self.rx_buffer)
    }
}
