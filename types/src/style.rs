//! Squiggle display preferences.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid color '{0}': expected six hex digits (RRGGBB)")]
pub struct ColorParseError(pub String);

/// An RGB color as written in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parse `RRGGBB`, with or without a leading `#`.
    pub fn from_hex(text: &str) -> Result<Self, ColorParseError> {
        let hex = text.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorParseError(text.to_string()));
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| ColorParseError(text.to_string()))?;
        Ok(Self {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        })
    }

    /// Little-endian channel order (`0x00BBGGRR`) used by the editor's
    /// indicator API.
    #[must_use]
    pub fn to_bgr(self) -> u32 {
        (u32::from(self.b) << 16) | (u32::from(self.g) << 8) | u32::from(self.r)
    }
}

/// How squiggles are painted. `None` means "leave the host default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SquiggleStyle {
    pub color: Option<Rgb>,
    pub alpha: Option<u8>,
}

impl SquiggleStyle {
    /// Sentinel used by the host API for "alpha not set".
    pub const UNSET_ALPHA: i32 = -1;

    /// Alpha as the host API expects it: 0-255, or [`Self::UNSET_ALPHA`].
    #[must_use]
    pub fn alpha_or_unset(&self) -> i32 {
        self.alpha.map_or(Self::UNSET_ALPHA, i32::from)
    }
}
