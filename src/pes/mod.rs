// src/pes/mod.rs - PES embroidery file support
pub mod cursor;
pub mod decoder;
pub mod palette;
pub mod pattern;

pub use decoder::{FormatError, parse_pes};
pub use palette::{Color, ColorHandle, PALETTE};
pub use pattern::{Block, BoundingBox, MachineOffset, Pattern, Stitch};
