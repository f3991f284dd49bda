//! Streaming PNG decoding.
//!
//! # Support Matrix
//!
//! | Source                                   | Stored as                        |
//! |------------------------------------------|----------------------------------|
//! | Gray 1/2/4/8                             | Gray 8                           |
//! | Gray 16, Gray+Alpha, RGB, RGBA (8 or 16) | unchanged, 16-bit big-endian     |
//! | Palette                                  | RGB 8, or RGBA 8 with `tRNS`     |
//! | `tRNS` on gray/RGB                       | alpha channel added              |
//! | Adam7 interlaced                         | rejected                         |
//!
//! Interlaced images are rejected because their rows arrive in seven passes,
//! which defeats single-pass block assembly.

use std::io::{BufRead, Seek};

use png::{BitDepth, Decoder, Reader, Transformations};
use tracing::debug;

use super::pixel::{ColorType, PixelFormat};
use super::ScanlineSource;
use crate::error::DecodeError;

/// Scanline reader over a PNG stream.
pub struct PngScanlines<R: BufRead + Seek> {
    reader: Reader<R>,
    format: PixelFormat,
    width: u32,
    height: u32,
}

impl<R: BufRead + Seek> PngScanlines<R> {
    /// Decode the PNG header from `source` and prepare for row decoding.
    ///
    /// # Errors
    /// - `Png` for a bad signature or malformed header chunks
    /// - `Interlaced` for Adam7 images
    /// - `UnsupportedFormat` if the expanded layout is not storable
    pub fn new(source: R) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(source);
        decoder.set_transformations(Transformations::EXPAND);

        let reader = decoder.read_info()?;
        let info = reader.info();
        let (width, height) = (info.width, info.height);

        debug!(
            "PNG header: {}x{}, color_type={:?}, bit_depth={:?}, interlaced={}",
            width, height, info.color_type, info.bit_depth, info.interlaced
        );

        if info.interlaced {
            return Err(DecodeError::Interlaced);
        }

        let (color_type, bit_depth) = reader.output_color_type();
        let format = pixel_format(color_type, bit_depth)?;

        Ok(Self {
            reader,
            format,
            width,
            height,
        })
    }
}

/// Map the decoder's post-transformation layout to a stored pixel format.
fn pixel_format(color_type: png::ColorType, bit_depth: BitDepth) -> Result<PixelFormat, DecodeError> {
    let stored = match color_type {
        png::ColorType::Grayscale => ColorType::Gray,
        png::ColorType::GrayscaleAlpha => ColorType::GrayAlpha,
        png::ColorType::Rgb => ColorType::Rgb,
        png::ColorType::Rgba => ColorType::Rgba,
        png::ColorType::Indexed => {
            // EXPAND always resolves the palette; reaching here means it didn't.
            return Err(DecodeError::UnsupportedFormat {
                color_type: "palette".to_string(),
                bit_depth: bit_depth as u8,
            });
        }
    };

    PixelFormat::new(stored, bit_depth as u8)
}

impl<R: BufRead + Seek> ScanlineSource for PngScanlines<R> {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn next_row(&mut self) -> Result<Option<&[u8]>, DecodeError> {
        Ok(self.reader.next_row()?.map(|row| row.data()))
    }
}
