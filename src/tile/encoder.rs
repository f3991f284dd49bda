//! Tile output encoding.
//!
//! Extracted tiles are flat buffers in the cache's pixel layout. `Raw` output
//! hands that buffer back as-is; `Png` output wraps it in a PNG with the same
//! colour type and bit depth, so no pixel values change.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};

use crate::error::ImageError;
use crate::format::{ColorType, PixelFormat};

use super::params::TileFormat;

// =============================================================================
// PNG Compression
// =============================================================================

/// Compression effort for PNG tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PngCompression {
    /// Fastest encoding, larger files
    #[default]
    Fast,
    /// The encoder's balanced setting
    Balanced,
    /// Smallest files, slowest encoding
    Best,
}

impl PngCompression {
    /// Name accepted on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            PngCompression::Fast => "fast",
            PngCompression::Balanced => "balanced",
            PngCompression::Best => "best",
        }
    }
}

impl From<PngCompression> for CompressionType {
    fn from(level: PngCompression) -> Self {
        match level {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Balanced => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        }
    }
}

impl FromStr for PngCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(PngCompression::Fast),
            "balanced" => Ok(PngCompression::Balanced),
            "best" => Ok(PngCompression::Best),
            other => Err(format!(
                "unknown PNG compression '{}' (expected fast, balanced or best)",
                other
            )),
        }
    }
}

impl fmt::Display for PngCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// TileEncoder
// =============================================================================

/// Encoder from extracted pixels to output bytes.
#[derive(Debug, Clone)]
pub struct TileEncoder {
    compression: PngCompression,
}

impl Default for TileEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TileEncoder {
    /// Encoder using fast PNG compression.
    pub fn new() -> Self {
        Self::with_compression(PngCompression::Fast)
    }

    /// Encoder using the given PNG compression level.
    pub fn with_compression(compression: PngCompression) -> Self {
        Self { compression }
    }

    /// PNG compression level in use.
    pub fn compression(&self) -> PngCompression {
        self.compression
    }

    /// Encode a `width` x `height` tile of `pixels` in `format`.
    ///
    /// # Errors
    /// - `Encode` if the buffer does not match the dimensions or the PNG
    ///   encoder fails
    pub fn encode(
        &self,
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        output: TileFormat,
    ) -> Result<Bytes, ImageError> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(ImageError::Encode {
                message: format!(
                    "tile buffer is {} bytes, expected {} for {}x{}",
                    pixels.len(),
                    expected,
                    width,
                    height
                ),
            });
        }

        match output {
            TileFormat::Raw => Ok(Bytes::from(pixels)),
            TileFormat::Png => self.encode_png(&pixels, width, height, format),
        }
    }

    fn encode_png(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Bytes, ImageError> {
        // The encoder takes 16-bit samples in native byte order.
        let samples: Cow<'_, [u8]> = if format.bit_depth == 16 {
            Cow::Owned(
                pixels
                    .chunks_exact(2)
                    .flat_map(|s| u16::from_be_bytes([s[0], s[1]]).to_ne_bytes())
                    .collect(),
            )
        } else {
            Cow::Borrowed(pixels)
        };

        let mut output = Vec::new();
        PngEncoder::new_with_quality(&mut output, self.compression.into(), FilterType::Adaptive)
            .write_image(&samples, width, height, color_type(format))
            .map_err(|e| ImageError::Encode {
                message: e.to_string(),
            })?;

        Ok(Bytes::from(output))
    }
}

fn color_type(format: PixelFormat) -> ExtendedColorType {
    let wide = format.bit_depth == 16;
    match (format.color_type, wide) {
        (ColorType::Gray, false) => ExtendedColorType::L8,
        (ColorType::Gray, true) => ExtendedColorType::L16,
        (ColorType::GrayAlpha, false) => ExtendedColorType::La8,
        (ColorType::GrayAlpha, true) => ExtendedColorType::La16,
        (ColorType::Rgb, false) => ExtendedColorType::Rgb8,
        (ColorType::Rgb, true) => ExtendedColorType::Rgb16,
        (ColorType::Rgba, false) => ExtendedColorType::Rgba8,
        (ColorType::Rgba, true) => ExtendedColorType::Rgba16,
    }
}
