// src/protocol/command.rs - Fixed layout binary command record
//
//  offset  size  field
//   0       4    magic
//   4       4    command index
//   8       4    X step count      12  4  X step interval
//  16       4    Y step count      20  4  Y step interval
//  24       4    motor step count  28  4  motor step interval
//  32       2    command kind
//  34       2    checksum (16-bit sum of bytes 0..34)
//
// All fields little endian. Step counts are signed absolute targets; the
// intervals are microseconds between two steps of that axis.
use thiserror::Error;

use crate::pes::cursor::ByteCursor;

pub const WIRE_SIZE: usize = 36;
const CHECKSUM_OFFSET: usize = WIRE_SIZE - 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Record is {len} bytes, expected {}", WIRE_SIZE)]
    Length { len: usize },
    #[error("Bad magic {found:#010x}")]
    BadMagic { found: u32 },
    #[error("Checksum mismatch: computed {computed:#06x}, record says {found:#06x}")]
    BadChecksum { computed: u16, found: u16 },
    #[error("Unknown command kind {0:#06x}")]
    UnknownKind(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    None,
    Move,
    EnableSteppers,
    DisableSteppers,
}

impl CommandKind {
    pub fn code(self) -> u16 {
        match self {
            CommandKind::None => 0,
            CommandKind::Move => b'm' as u16,
            CommandKind::EnableSteppers => b'e' as u16,
            CommandKind::DisableSteppers => b'd' as u16,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(CommandKind::None),
            c if c == b'm' as u16 => Some(CommandKind::Move),
            c if c == b'e' as u16 => Some(CommandKind::EnableSteppers),
            c if c == b'd' as u16 => Some(CommandKind::DisableSteppers),
            _ => None,
        }
    }
}

/// Step target and pacing of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisMove {
    pub step_count: i32,
    pub step_interval: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub magic: u32,
    pub index: u32,
    pub x: AxisMove,
    pub y: AxisMove,
    pub motor: AxisMove,
    pub kind: CommandKind,
}

impl Command {
    /// Driver enable/disable record. Carries no axis payload.
    pub fn control(magic: u32, kind: CommandKind) -> Self {
        Self {
            magic,
            index: 0,
            x: AxisMove::default(),
            y: AxisMove::default(),
            motor: AxisMove::default(),
            kind,
        }
    }

    /// Serialize the record; the checksum is computed here, over the final bytes.
    pub fn to_bytes(&self) -> [u8; WIRE_SIZE] {
        let mut out = [0u8; WIRE_SIZE];
        let words = [
            self.magic,
            self.index,
            self.x.step_count as u32,
            self.x.step_interval,
            self.y.step_count as u32,
            self.y.step_interval,
            self.motor.step_count as u32,
            self.motor.step_interval,
        ];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out[32..34].copy_from_slice(&self.kind.code().to_le_bytes());
        let sum = checksum(&out[..CHECKSUM_OFFSET]);
        out[CHECKSUM_OFFSET..].copy_from_slice(&sum.to_le_bytes());
        out
    }

    /// Parse and verify a record as the controller would.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != WIRE_SIZE {
            return Err(WireError::Length { len: bytes.len() });
        }
        let short = || WireError::Length { len: bytes.len() };
        let mut cursor = ByteCursor::new(bytes);

        let magic = cursor.read_u32_le().ok_or_else(short)?;
        let index = cursor.read_u32_le().ok_or_else(short)?;
        let mut axes = [AxisMove::default(); 3];
        for axis in axes.iter_mut() {
            axis.step_count = cursor.read_i32_le().ok_or_else(short)?;
            axis.step_interval = cursor.read_u32_le().ok_or_else(short)?;
        }
        let kind_code = cursor.read_u16_le().ok_or_else(short)?;
        let found = cursor.read_u16_le().ok_or_else(short)?;

        let computed = checksum(&bytes[..CHECKSUM_OFFSET]);
        if computed != found {
            return Err(WireError::BadChecksum { computed, found });
        }
        let kind = CommandKind::from_code(kind_code).ok_or(WireError::UnknownKind(kind_code))?;

        Ok(Self { magic, index, x: axes[0], y: axes[1], motor: axes[2], kind })
    }
}

/// 16-bit wrapping sum of all bytes.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}
