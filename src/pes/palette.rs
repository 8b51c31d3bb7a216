// src/pes/palette.rs - Built-in PEC thread palette
use std::fmt;

/// A thread color from the built-in palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub name: &'static str,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(name: &'static str, r: u8, g: u8, b: u8) -> Self {
        Self { name, r, g, b }
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    /// Three blank cells on a 24-bit ANSI background in this color.
    pub fn ansi_swatch(&self) -> String {
        format!("\x1B[48;2;{};{};{}m   \x1B[0m", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{:02x}{:02x}{:02x})", self.name, self.r, self.g, self.b)
    }
}

/// The files only ever reference colors by index into this table.
pub static PALETTE: [Color; 65] = [
    Color::new("NULL", 0, 0, 0),
    Color::new("Color1", 14, 31, 124),
    Color::new("Color2", 10, 85, 163),
    Color::new("Color3", 48, 135, 119),
    Color::new("Color4", 75, 107, 175),
    Color::new("Color5", 237, 23, 31),
    Color::new("Color6", 209, 92, 0),
    Color::new("Color7", 145, 54, 151),
    Color::new("Color8", 228, 154, 203),
    Color::new("Color9", 145, 95, 172),
    Color::new("Color10", 157, 214, 125),
    Color::new("Color11", 232, 169, 0),
    Color::new("Color12", 254, 186, 53),
    Color::new("Color13", 255, 255, 0),
    Color::new("Color14", 112, 188, 31),
    Color::new("Color15", 192, 148, 0),
    Color::new("Color16", 168, 168, 168),
    Color::new("Color17", 123, 111, 0),
    Color::new("Color18", 255, 255, 179),
    Color::new("Color19", 79, 85, 86),
    Color::new("Black", 0, 0, 0),
    Color::new("Color21", 11, 61, 145),
    Color::new("Color22", 119, 1, 118),
    Color::new("Color23", 41, 49, 51),
    Color::new("Color24", 42, 19, 1),
    Color::new("Color25", 246, 74, 138),
    Color::new("Color26", 178, 118, 36),
    Color::new("Color27", 252, 187, 196),
    Color::new("Color28", 254, 55, 15),
    Color::new("White", 240, 240, 240),
    Color::new("Color30", 106, 28, 138),
    Color::new("Color31", 168, 221, 196),
    Color::new("Color32", 37, 132, 187),
    Color::new("Color33", 254, 179, 67),
    Color::new("Color34", 255, 240, 141),
    Color::new("Color35", 208, 166, 96),
    Color::new("Color36", 209, 84, 0),
    Color::new("Color37", 102, 186, 73),
    Color::new("Color38", 19, 74, 70),
    Color::new("Color39", 135, 135, 135),
    Color::new("Color40", 216, 202, 198),
    Color::new("Color41", 67, 86, 7),
    Color::new("Color42", 254, 227, 197),
    Color::new("Color43", 249, 147, 188),
    Color::new("Color44", 0, 56, 34),
    Color::new("Color45", 178, 175, 212),
    Color::new("Color46", 104, 106, 176),
    Color::new("Color47", 239, 227, 185),
    Color::new("Color48", 247, 56, 102),
    Color::new("Color49", 181, 76, 100),
    Color::new("Color50", 19, 43, 26),
    Color::new("Color51", 199, 1, 85),
    Color::new("Color52", 254, 158, 50),
    Color::new("Color53", 168, 222, 235),
    Color::new("Color54", 0, 103, 26),
    Color::new("Color55", 78, 41, 144),
    Color::new("Color56", 47, 126, 32),
    Color::new("Color57", 253, 217, 222),
    Color::new("Color58", 255, 217, 17),
    Color::new("Color59", 9, 91, 166),
    Color::new("Color60", 240, 249, 112),
    Color::new("Color61", 227, 243, 91),
    Color::new("Color62", 255, 200, 100),
    Color::new("Color63", 255, 200, 150),
    Color::new("Color64", 255, 200, 200),
];

/// Index of a palette entry. Blocks store the handle, never the color itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorHandle(u8);

impl ColorHandle {
    /// `None` when `index` is past the end of the palette.
    pub fn new(index: u8) -> Option<Self> {
        if (index as usize) < PALETTE.len() {
            Some(Self(index))
        } else {
            None
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn color(self) -> &'static Color {
        &PALETTE[self.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_bounds() {
        assert_eq!(PALETTE.len(), 65);
        assert_eq!(PALETTE[0].name, "NULL");
        assert_eq!(PALETTE[0].rgb(), (0, 0, 0));
        assert!(ColorHandle::new(64).is_some());
        assert!(ColorHandle::new(65).is_none());
        assert!(ColorHandle::new(255).is_none());
    }

    #[test]
    fn test_handle_resolves_color() {
        let white = ColorHandle::new(29).unwrap();
        assert_eq!(white.index(), 29);
        assert_eq!(white.color().name, "White");
        assert_eq!(white.color().rgb(), (240, 240, 240));
    }

    #[test]
    fn test_ansi_swatch() {
        let swatch = PALETTE[5].ansi_swatch();
        assert_eq!(swatch, "\x1B[48;2;237;23;31m   \x1B[0m");
    }
}
