// Shared helpers for building PES buffers in tests
#![allow(dead_code)]

pub const STREAM_OFFSET: usize = 532;

/// Assembles a minimal PES file around a hand written stitch stream.
#[derive(Debug, Clone)]
pub struct PesBuilder {
    pec: u32,
    colors: Vec<u8>,
    stream: Vec<u8>,
}

impl PesBuilder {
    pub fn new(colors: &[u8]) -> Self {
        Self { pec: 0x30, colors: colors.to_vec(), stream: Vec::new() }
    }

    pub fn pec(mut self, pec: u32) -> Self {
        self.pec = pec;
        self
    }

    /// Both deltas in the one byte form, -64..=63.
    pub fn short(mut self, dx: i32, dy: i32) -> Self {
        self.stream.push(short_byte(dx));
        self.stream.push(short_byte(dy));
        self
    }

    /// Both deltas in the two byte form, -2048..=2047.
    pub fn long(mut self, dx: i32, dy: i32) -> Self {
        self.stream.extend_from_slice(&long_bytes(dx));
        self.stream.extend_from_slice(&long_bytes(dy));
        self
    }

    pub fn long_x(mut self, dx: i32, dy: i32) -> Self {
        self.stream.extend_from_slice(&long_bytes(dx));
        self.stream.push(short_byte(dy));
        self
    }

    pub fn long_y(mut self, dx: i32, dy: i32) -> Self {
        self.stream.push(short_byte(dx));
        self.stream.extend_from_slice(&long_bytes(dy));
        self
    }

    pub fn color_change(mut self) -> Self {
        self.stream.extend_from_slice(&[0xFE, 0xB0, 0x02]);
        self
    }

    pub fn end(mut self) -> Self {
        self.stream.extend_from_slice(&[0xFF, 0x00]);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.stream.extend_from_slice(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let pec = self.pec as usize;
        let mut data = vec![0u8; pec + STREAM_OFFSET];
        data[0..4].copy_from_slice(b"#PES");
        data[4..8].copy_from_slice(b"0001");
        data[8..12].copy_from_slice(&self.pec.to_le_bytes());
        data[pec + 48] = (self.colors.len() - 1) as u8;
        data[pec + 49..pec + 49 + self.colors.len()].copy_from_slice(&self.colors);
        data.extend_from_slice(&self.stream);
        data
    }
}

pub fn short_byte(delta: i32) -> u8 {
    assert!((-64..=63).contains(&delta));
    (delta as u8) & 0x7F
}

pub fn long_bytes(delta: i32) -> [u8; 2] {
    assert!((-2048..=2047).contains(&delta));
    let value = (delta as u16) & 0x0FFF;
    [0x80 | (value >> 8) as u8, (value & 0xFF) as u8]
}
