//! Source image decoding.
//!
//! The cache builder consumes decoded pixels one scanline at a time through the
//! [`ScanlineSource`] trait, so it never needs the whole image in memory and
//! never seeks backwards. [`PngScanlines`] implements it over the `png` crate's
//! streaming reader.

mod decoder;
mod pixel;

pub use decoder::PngScanlines;
pub use pixel::{ColorType, PixelFormat};

use crate::error::DecodeError;

/// A forward-only stream of decoded rows.
pub trait ScanlineSource {
    /// Image width in pixels.
    fn width(&self) -> u32;

    /// Image height in pixels.
    fn height(&self) -> u32;

    /// Layout of the bytes returned by [`next_row`](Self::next_row).
    fn pixel_format(&self) -> PixelFormat;

    /// Decode the next row, `width * bytes_per_pixel` bytes long.
    ///
    /// Returns `Ok(None)` once every row has been produced.
    fn next_row(&mut self) -> Result<Option<&[u8]>, DecodeError>;
}
