//! Subreel Core Type Definitions
//!
//! Defines fundamental types shared across the pipeline.

use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

// =============================================================================
// Color
// =============================================================================

/// Opaque RGB color (0-255 per channel)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Parses a hex color string (e.g. `#RRGGBB` or `#RGB`).
    pub fn try_from_hex(hex: &str) -> Result<Self, String> {
        let hex = hex.trim().trim_start_matches('#');

        // Byte-slicing below requires ASCII; multibyte input must not panic.
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("Invalid hex color: {}", hex));
        }

        let parse_channel =
            |s: &str| -> Result<u8, String> { u8::from_str_radix(s, 16).map_err(|e| e.to_string()) };

        match hex.len() {
            // Short form: F -> FF (0xF * 17 = 0xFF)
            3 => {
                let r = parse_channel(&hex[0..1])? * 17;
                let g = parse_channel(&hex[1..2])? * 17;
                let b = parse_channel(&hex[2..3])? * 17;
                Ok(Self::new(r, g, b))
            }
            6 => Ok(Self::new(
                parse_channel(&hex[0..2])?,
                parse_channel(&hex[2..4])?,
                parse_channel(&hex[4..6])?,
            )),
            len => Err(format!("Invalid hex color length: {}", len)),
        }
    }

    /// Parses a hex color string, falling back to black on invalid input.
    pub fn from_hex(hex: &str) -> Self {
        match Self::try_from_hex(hex) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "Failed to parse hex color '{}': {}, defaulting to black",
                    hex, e
                );
                Self::black()
            }
        }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::black()
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Output frame size in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns a copy with both axes forced even (odd axis reduced by one
    /// pixel, minimum 2). Planar 4:2:0 encoders reject odd dimensions.
    pub fn even(self) -> Self {
        let clamp_even = |v: u32| {
            let v = v.max(2);
            v - (v % 2)
        };
        let even = Self::new(clamp_even(self.width), clamp_even(self.height));
        if even != self {
            warn!(
                "Adjusting resolution {}x{} to {}x{} for codec compatibility",
                self.width, self.height, even.width, even.height
            );
        }
        even
    }

    /// Size of one rgb24 frame in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_from_hex() {
        assert_eq!(Rgb::try_from_hex("#FFFFFF").unwrap(), Rgb::white());
        assert_eq!(Rgb::try_from_hex("000000").unwrap(), Rgb::black());
        assert_eq!(Rgb::try_from_hex("#1a2b3c").unwrap(), Rgb::new(26, 43, 60));
        assert_eq!(Rgb::try_from_hex("#fff").unwrap(), Rgb::white());
        assert!(Rgb::try_from_hex("#12345").is_err());
        assert!(Rgb::try_from_hex("#GGGGGG").is_err());
    }

    #[test]
    fn test_rgb_from_hex_fallback() {
        assert_eq!(Rgb::from_hex("not a color"), Rgb::black());
    }

    #[test]
    fn test_rgb_from_hex_multibyte_input_falls_back() {
        // Multibyte strings whose byte length happens to be 3 or 6 must be
        // rejected as invalid, not sliced mid-character.
        assert!(Rgb::try_from_hex("é0").is_err());
        assert!(Rgb::try_from_hex("ééé").is_err());
        assert_eq!(Rgb::from_hex("é0"), Rgb::black());
        assert_eq!(Rgb::from_hex("#ééé"), Rgb::black());
    }

    #[test]
    fn test_resolution_even() {
        assert_eq!(Resolution::new(1280, 720).even(), Resolution::new(1280, 720));
        assert_eq!(Resolution::new(1281, 720).even(), Resolution::new(1280, 720));
        assert_eq!(Resolution::new(1280, 721).even(), Resolution::new(1280, 720));
        assert_eq!(Resolution::new(99, 33).even(), Resolution::new(98, 32));
        assert_eq!(Resolution::new(1, 1).even(), Resolution::new(2, 2));
    }

    #[test]
    fn test_frame_bytes() {
        assert_eq!(Resolution::new(4, 2).frame_bytes(), 24);
    }
}
