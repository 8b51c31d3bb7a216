// src/pes/decoder.rs - PES/PEC stitch stream decoder
//
// Layout (little endian):
//   0..4            "#PES"
//   8..12           offset `pec` of the embedded PEC section
//   pec + 48        number of colors minus one
//   pec + 49 ..     palette indices, one byte each
//   pec + 532 ..    delta encoded stitch stream
use std::mem;

use thiserror::Error;

use crate::pes::cursor::ByteCursor;
use crate::pes::palette::{ColorHandle, PALETTE};
use crate::pes::pattern::{Block, Pattern, Stitch};

const PES_MAGIC: &[u8; 4] = b"#PES";
const MIN_FILE_LEN: usize = 48;
const PEC_OFFSET_FIELD: usize = 8;
const COLOR_TABLE_OFFSET: usize = 48;
const STITCH_STREAM_OFFSET: usize = 532;

const END_OF_STREAM: (u8, u8) = (0xFF, 0x00);
const COLOR_CHANGE: (u8, u8) = (0xFE, 0xB0);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("File too small: {len} bytes, need at least {required}")]
    TooSmall { len: usize, required: usize },
    #[error("Not a PES file (missing #PES marker)")]
    BadMagic,
    #[error("Palette index {index} out of range (palette has {} entries)", PALETTE.len())]
    PaletteIndexOutOfRange { index: u8 },
    #[error("Stitch stream ends inside the unit starting at offset {offset}")]
    Truncated { offset: usize },
    #[error("Block {block} starts but the color table has no color left for it")]
    ColorTableExhausted { block: usize },
    #[error("Coordinate out of range at offset {offset}")]
    CoordinateOverflow { offset: usize },
}

/// Decode a PES file into blocks of absolute stitches.
///
/// `data` is the file content exactly as read from disk. Do not append zero
/// padding: every byte up to the end of the buffer is stitch data, so padding
/// without a preceding end-of-stream marker decodes as zero-length stitches.
/// Decoding stops at the end-of-stream marker or at the end of the buffer,
/// whichever comes first.
pub fn parse_pes(data: &[u8]) -> Result<Pattern, FormatError> {
    if data.len() < MIN_FILE_LEN {
        return Err(FormatError::TooSmall { len: data.len(), required: MIN_FILE_LEN });
    }
    if &data[..PES_MAGIC.len()] != PES_MAGIC {
        return Err(FormatError::BadMagic);
    }

    let mut header = ByteCursor::at(data, PEC_OFFSET_FIELD);
    let pec = header
        .read_u32_le()
        .ok_or(FormatError::TooSmall { len: data.len(), required: MIN_FILE_LEN })? as usize;
    let stream_start = pec.saturating_add(STITCH_STREAM_OFFSET);
    if stream_start >= data.len() {
        return Err(FormatError::TooSmall { len: data.len(), required: stream_start.saturating_add(1) });
    }

    let color_table = parse_color_table(data, pec)?;
    tracing::debug!("PEC section at {}, {} colors declared", pec, color_table.len());

    let mut pattern = Pattern::new(color_table);
    parse_stitches(data, stream_start, &mut pattern)?;

    tracing::debug!(
        "Decoded {} blocks, {} stitches ({} jumps), bounds {:?}",
        pattern.blocks.len(),
        pattern.stitch_count(),
        pattern.jump_count(),
        pattern.bounds
    );
    Ok(pattern)
}

fn parse_color_table(data: &[u8], pec: usize) -> Result<Vec<ColorHandle>, FormatError> {
    let table_offset = pec + COLOR_TABLE_OFFSET;
    let mut cursor = ByteCursor::at(data, table_offset);
    let count = cursor.read_u8().ok_or(FormatError::Truncated { offset: table_offset })? as usize + 1;

    let mut colors = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = cursor.position();
        let index = cursor.read_u8().ok_or(FormatError::Truncated { offset })?;
        let handle = ColorHandle::new(index).ok_or(FormatError::PaletteIndexOutOfRange { index })?;
        colors.push(handle);
    }
    Ok(colors)
}

fn parse_stitches(data: &[u8], start: usize, pattern: &mut Pattern) -> Result<(), FormatError> {
    let mut cursor = ByteCursor::at(data, start);

    // The first block exists before any marker and keeps the first color.
    // A marker only starts a block, and only then uses up a color, when the
    // pending block already holds a stitch.
    let mut next_color = 1;
    let mut pending = Block::new(pattern.color_table[0]);
    let (mut x, mut y) = (0i32, 0i32);

    while !cursor.is_at_end() {
        let offset = cursor.position();
        let val1 = cursor.read_u8().ok_or(FormatError::Truncated { offset })?;
        let val2 = cursor.read_u8().ok_or(FormatError::Truncated { offset })?;

        if (val1, val2) == END_OF_STREAM {
            break;
        }

        if (val1, val2) == COLOR_CHANGE {
            // block attribute byte, unused
            if !cursor.skip(1) {
                return Err(FormatError::Truncated { offset });
            }
            if pending.is_empty() {
                tracing::trace!("Color change at {} on an empty block, ignored", offset);
                continue;
            }
            let color = *pattern
                .color_table
                .get(next_color)
                .ok_or(FormatError::ColorTableExhausted { block: pattern.blocks.len() + 1 })?;
            next_color += 1;

            tracing::trace!("Color change at {}, next block uses {}", offset, color.color().name);
            let finished = mem::replace(&mut pending, Block::new(color));
            pattern.blocks.push(finished);
            continue;
        }

        let (dx, dy, jump) = decode_deltas(val1, val2, &mut cursor).ok_or(FormatError::Truncated { offset })?;
        x = x.checked_add(dx).ok_or(FormatError::CoordinateOverflow { offset })?;
        y = y.checked_add(dy).ok_or(FormatError::CoordinateOverflow { offset })?;

        pattern.include_point(x, y);
        pending.stitches.push(Stitch::new(x, y, jump));
    }

    if !pending.is_empty() {
        pattern.blocks.push(pending);
    }
    Ok(())
}

/// Decode one stitch unit whose first two bytes are already read.
///
/// A byte with the high bit set is the top nibble of a 12-bit offset and the
/// byte after it holds the low eight bits. For X that low byte is `val2`, so
/// the Y field moves on to the next stream byte. Any 12-bit field makes the
/// stitch a jump. `None` when the stream ends inside the unit.
fn decode_deltas(val1: u8, val2: u8, cursor: &mut ByteCursor<'_>) -> Option<(i32, i32, bool)> {
    let mut jump = false;

    let (dx, y_field) = if val1 & 0x80 != 0 {
        jump = true;
        (long_offset(val1, val2), cursor.read_u8()?)
    } else {
        (short_offset(val1), val2)
    };

    let dy = if y_field & 0x80 != 0 {
        jump = true;
        long_offset(y_field, cursor.read_u8()?)
    } else {
        short_offset(y_field)
    };

    Some((dx, dy, jump))
}

/// 12-bit two's complement from the low nibble of `high` and all of `low`.
fn long_offset(high: u8, low: u8) -> i32 {
    let value = (((high & 0x0F) as i32) << 8) | low as i32;
    if value & 0x800 != 0 { value - 0x1000 } else { value }
}

/// 7-bit two's complement.
fn short_offset(value: u8) -> i32 {
    let value = value as i32;
    if value & 0x40 != 0 { value - 0x80 } else { value }
}
