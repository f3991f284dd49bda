//! Pixel layouts stored in the cache.
//!
//! Only layouts with whole-byte samples are stored: sub-byte grayscale and
//! palette images are expanded by the decoder before they reach the cache.

use crate::error::DecodeError;

// =============================================================================
// ColorType
// =============================================================================

/// Channel layout of a stored pixel.
///
/// Discriminants are the PNG `IHDR` colour type codes and are what the cache
/// header records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    /// Single luminance channel
    Gray,
    /// Luminance plus alpha
    GrayAlpha,
    /// Red, green, blue
    Rgb,
    /// Red, green, blue, alpha
    Rgba,
}

impl ColorType {
    /// PNG colour type code.
    pub const fn code(self) -> u8 {
        match self {
            ColorType::Gray => 0,
            ColorType::Rgb => 2,
            ColorType::GrayAlpha => 4,
            ColorType::Rgba => 6,
        }
    }

    /// Look up a colour type by its PNG code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ColorType::Gray),
            2 => Some(ColorType::Rgb),
            4 => Some(ColorType::GrayAlpha),
            6 => Some(ColorType::Rgba),
            _ => None,
        }
    }

    /// Number of channels per pixel.
    pub const fn channels(self) -> usize {
        match self {
            ColorType::Gray => 1,
            ColorType::GrayAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
        }
    }

    /// Whether the last channel is alpha.
    pub const fn has_alpha(self) -> bool {
        matches!(self, ColorType::GrayAlpha | ColorType::Rgba)
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            ColorType::Gray => "grayscale",
            ColorType::GrayAlpha => "grayscale+alpha",
            ColorType::Rgb => "RGB",
            ColorType::Rgba => "RGBA",
        }
    }
}

// =============================================================================
// PixelFormat
// =============================================================================

/// Colour type plus bits per channel (8 or 16, big-endian samples).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub color_type: ColorType,
    pub bit_depth: u8,
}

impl PixelFormat {
    /// Create a pixel format, rejecting bit depths that are not whole bytes.
    pub fn new(color_type: ColorType, bit_depth: u8) -> Result<Self, DecodeError> {
        match bit_depth {
            8 | 16 => Ok(Self {
                color_type,
                bit_depth,
            }),
            _ => Err(DecodeError::UnsupportedFormat {
                color_type: color_type.name().to_string(),
                bit_depth,
            }),
        }
    }

    /// Bytes per channel sample.
    #[inline]
    pub const fn bytes_per_sample(&self) -> usize {
        self.bit_depth as usize / 8
    }

    /// Bytes per pixel.
    #[inline]
    pub const fn bytes_per_pixel(&self) -> usize {
        self.color_type.channels() * self.bytes_per_sample()
    }

    /// Bits per pixel, as recorded in the cache header.
    #[inline]
    pub const fn bits_per_pixel(&self) -> u32 {
        self.color_type.channels() as u32 * self.bit_depth as u32
    }

    /// Whether `pixel` is fully transparent.
    ///
    /// Always false for layouts without alpha.
    #[inline]
    pub fn is_transparent(&self, pixel: &[u8]) -> bool {
        if !self.color_type.has_alpha() {
            return false;
        }
        let alpha = &pixel[pixel.len() - self.bytes_per_sample()..];
        alpha.iter().all(|&b| b == 0)
    }
}
