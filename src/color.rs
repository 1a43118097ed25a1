//! Hex color handling for ring and glow colors

use std::fmt;

/// An opaque RGB color parsed from `#RRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (the `#` prefix is optional).
    /// Returns None for any other length or non-hex digits.
    pub fn parse(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }

        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Whether a string is a well-formed `#RRGGBB` triplet (prefix required)
    pub fn is_well_formed(hex: &str) -> bool {
        hex.starts_with('#') && Self::parse(hex).is_some()
    }

    /// Lowercase `#rrggbb`
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Lowercase `#rrggbbaa`, as used for the glow shadow
    pub fn to_hex_with_alpha(self, alpha: u8) -> String {
        format!("{}{:02x}", self.to_hex(), alpha)
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Convert a 0.0-1.0 opacity to an alpha byte (rounded)
pub fn alpha_byte(opacity: f32) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}
