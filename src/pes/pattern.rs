// src/pes/pattern.rs - Decoded stitch data
use crate::pes::palette::{Color, ColorHandle};

/// One needle position in absolute file units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stitch {
    pub x: i32,
    pub y: i32,
    /// The hoop moves without the needle piercing the fabric.
    pub jump: bool,
    /// Stitches per minute; zero until the speed planner runs.
    pub speed: u32,
}

impl Stitch {
    pub fn new(x: i32, y: i32, jump: bool) -> Self {
        Self { x, y, jump, speed: 0 }
    }
}

/// A run of stitches sewn with one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub color: ColorHandle,
    pub stitches: Vec<Stitch>,
}

impl Block {
    pub fn new(color: ColorHandle) -> Self {
        Self { color, stitches: Vec::new() }
    }

    pub fn color(&self) -> &'static Color {
        self.color.color()
    }

    pub fn len(&self) -> usize {
        self.stitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stitches.is_empty()
    }

    pub fn jump_count(&self) -> usize {
        self.stitches.iter().filter(|s| s.jump).count()
    }
}

/// Extent of all decoded coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl BoundingBox {
    pub fn from_point(x: i32, y: i32) -> Self {
        Self { min_x: x, max_x: x, min_y: y, max_y: y }
    }

    pub fn include(&mut self, x: i32, y: i32) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    pub fn width(&self) -> i64 {
        self.max_x as i64 - self.min_x as i64
    }

    pub fn height(&self) -> i64 {
        self.max_y as i64 - self.min_y as i64
    }
}

/// Shift that moves a pattern with negative coordinates into the machine's
/// non-negative workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineOffset {
    pub x: i32,
    pub y: i32,
}

/// A fully decoded embroidery design.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pattern {
    pub blocks: Vec<Block>,
    /// `None` until the first stitch is decoded.
    pub bounds: Option<BoundingBox>,
    /// Color table as declared in the file, in file order.
    pub color_table: Vec<ColorHandle>,
}

impl Pattern {
    pub fn new(color_table: Vec<ColorHandle>) -> Self {
        Self { blocks: Vec::new(), bounds: None, color_table }
    }

    pub fn color_table(&self) -> &[ColorHandle] {
        &self.color_table
    }

    /// Colors in the order the blocks use them.
    pub fn colors(&self) -> Vec<&'static Color> {
        self.blocks.iter().map(Block::color).collect()
    }

    pub fn stitch_count(&self) -> usize {
        self.blocks.iter().map(Block::len).sum()
    }

    pub fn jump_count(&self) -> usize {
        self.blocks.iter().map(Block::jump_count).sum()
    }

    pub fn stitches(&self) -> impl Iterator<Item = &Stitch> + '_ {
        self.blocks.iter().flat_map(|b| b.stitches.iter())
    }

    pub fn machine_offset(&self) -> MachineOffset {
        match self.bounds {
            Some(bounds) => MachineOffset {
                x: bounds.min_x.saturating_neg().max(0),
                y: bounds.min_y.saturating_neg().max(0),
            },
            None => MachineOffset::default(),
        }
    }

    pub(crate) fn include_point(&mut self, x: i32, y: i32) {
        match self.bounds.as_mut() {
            Some(bounds) => bounds.include(x, y),
            None => self.bounds = Some(BoundingBox::from_point(x, y)),
        }
    }
}
