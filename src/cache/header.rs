//! On-disk cache layout.
//!
//! # Cache File Structure
//!
//! ```text
//! ┌──────────────────────────────┐ 0
//! │ header record (72 bytes)     │
//! │ zero padding                 │
//! ├──────────────────────────────┤ HEADER_SIZE (4096)
//! │ block 0                      │
//! │ block 1                      │
//! │ ...                          │
//! │ block N-1                    │
//! └──────────────────────────────┘ HEADER_SIZE + N * block_bytes
//! ```
//!
//! ## Header Record (all integers little-endian)
//! ```text
//! Bytes  0-7:  Magic "PNGTILE\0"
//! Bytes  8-11: Format version
//! Bytes 12-15: Flags (bit 0: background pixel present)
//! Bytes 16-23: Source mtime, seconds since the Unix epoch (signed)
//! Bytes 24-27: Source mtime, nanoseconds
//! Bytes 28-31: Image width
//! Bytes 32-35: Image height
//! Bytes 36-39: Block width
//! Bytes 40-43: Block height
//! Byte  44:    Bits per pixel
//! Byte  45:    PNG colour type of stored pixels
//! Byte  46:    Bits per channel (8 or 16)
//! Byte  47:    Background pixel length (0-4)
//! Bytes 48-55: Source length in bytes
//! Bytes 56-63: Block count
//! Bytes 64-67: Background pixel (zero padded)
//! Bytes 68-71: Reserved (zero)
//! ```
//!
//! Blocks are laid out row-major over the block grid. Inside a block, pixels
//! are row-major with a stride of `block_width * bytes_per_pixel`; parts of
//! edge blocks that lie outside the image hold the background pixel.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::CacheError;
use crate::format::{ColorType, PixelFormat};
use crate::io::{read_i64_le, read_u32_le, read_u64_le};

use super::params::{BackgroundPixel, MAX_BLOCK_SIZE};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes at the start of every cache file.
pub const CACHE_MAGIC: [u8; 8] = *b"PNGTILE\0";

/// Current cache format version.
pub const CACHE_VERSION: u32 = 1;

/// Size of the header region; block data starts here, page-aligned.
pub const HEADER_SIZE: usize = 4096;

/// Bytes of the header region that carry fields.
pub const HEADER_RECORD_SIZE: usize = 72;

const FLAG_BACKGROUND: u32 = 1;

// =============================================================================
// CacheHeader
// =============================================================================

/// Parsed cache header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeader {
    /// Format version the cache was written with
    pub version: u32,

    /// Modification time of the source when the cache was built
    pub source_mtime: SystemTime,

    /// Source file length when the cache was built
    pub source_len: u64,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Layout of stored pixels
    pub format: PixelFormat,

    /// Block width in pixels
    pub block_width: u32,

    /// Block height in pixels
    pub block_height: u32,

    /// Number of blocks in the file
    pub block_count: u64,

    /// Pixel used for padding and transparent pixels, if configured
    pub background: Option<BackgroundPixel>,
}

impl CacheHeader {
    /// Describe a cache for an image of the given geometry.
    ///
    /// The block count is derived from the image and block dimensions.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        block_width: u32,
        block_height: u32,
        source_mtime: SystemTime,
        source_len: u64,
        background: Option<BackgroundPixel>,
    ) -> Self {
        let block_count = block_grid_len(width, block_width) * block_grid_len(height, block_height);
        Self {
            version: CACHE_VERSION,
            source_mtime,
            source_len,
            width,
            height,
            format,
            block_width,
            block_height,
            block_count,
            background,
        }
    }

    /// Parse a header from the start of a cache file.
    ///
    /// Only the first [`HEADER_RECORD_SIZE`] bytes are examined.
    ///
    /// # Errors
    /// - `TooSmall` if fewer than `HEADER_RECORD_SIZE` bytes are given
    /// - `BadMagic` if the file is not a cache
    /// - `UnsupportedVersion` if written by another format version
    /// - `InvalidGeometry` if the fields are inconsistent
    pub fn parse(bytes: &[u8]) -> Result<Self, CacheError> {
        if bytes.len() < HEADER_RECORD_SIZE {
            return Err(CacheError::TooSmall {
                required: HEADER_RECORD_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);
        if magic != CACHE_MAGIC {
            return Err(CacheError::BadMagic(magic));
        }

        // Version is checked before anything else so that a layout change can
        // never be misread as a geometry error.
        let version = read_u32_le(&bytes[8..12]);
        if version != CACHE_VERSION {
            return Err(CacheError::UnsupportedVersion {
                found: version,
                expected: CACHE_VERSION,
            });
        }

        let flags = read_u32_le(&bytes[12..16]);
        let source_mtime = decode_time(read_i64_le(&bytes[16..24]), read_u32_le(&bytes[24..28]))?;
        let width = read_u32_le(&bytes[28..32]);
        let height = read_u32_le(&bytes[32..36]);
        let block_width = read_u32_le(&bytes[36..40]);
        let block_height = read_u32_le(&bytes[40..44]);
        let bits_per_pixel = bytes[44];
        let color_code = bytes[45];
        let bit_depth = bytes[46];
        let background_len = bytes[47] as usize;
        let source_len = read_u64_le(&bytes[48..56]);
        let block_count = read_u64_le(&bytes[56..64]);

        let invalid = |message: String| CacheError::InvalidGeometry(message);

        let color_type = ColorType::from_code(color_code)
            .ok_or_else(|| invalid(format!("unknown colour type {}", color_code)))?;
        let format = PixelFormat::new(color_type, bit_depth)
            .map_err(|_| invalid(format!("unsupported bit depth {}", bit_depth)))?;
        if format.bits_per_pixel() != bits_per_pixel as u32 {
            return Err(invalid(format!(
                "bits per pixel {} does not match {} at {} bits",
                bits_per_pixel,
                color_type.name(),
                bit_depth
            )));
        }

        let background = if flags & FLAG_BACKGROUND != 0 {
            if background_len != format.bytes_per_pixel() {
                return Err(invalid(format!(
                    "background pixel is {} bytes, pixels are {}",
                    background_len,
                    format.bytes_per_pixel()
                )));
            }
            let pixel = BackgroundPixel::new(&bytes[64..64 + background_len])
                .map_err(|e| invalid(e.to_string()))?;
            Some(pixel)
        } else {
            None
        };

        let header = Self {
            version,
            source_mtime,
            source_len,
            width,
            height,
            format,
            block_width,
            block_height,
            block_count,
            background,
        };
        header.validate()?;

        Ok(header)
    }

    /// Check that the geometry fields agree and that the whole file is
    /// addressable. Every geometry helper below relies on this holding.
    ///
    /// # Errors
    /// - `InvalidGeometry` describing the first inconsistency found
    pub fn validate(&self) -> Result<(), CacheError> {
        let invalid = |message: String| CacheError::InvalidGeometry(message);

        if self.width == 0 || self.height == 0 {
            return Err(invalid(format!("empty image {}x{}", self.width, self.height)));
        }
        if !(1..=MAX_BLOCK_SIZE).contains(&self.block_width)
            || !(1..=MAX_BLOCK_SIZE).contains(&self.block_height)
        {
            return Err(invalid(format!(
                "block size {}x{} outside 1..={}",
                self.block_width, self.block_height, MAX_BLOCK_SIZE
            )));
        }

        let expected_blocks = self.blocks_x() * self.blocks_y();
        if self.block_count != expected_blocks {
            return Err(invalid(format!(
                "block count {} does not match {} for {}x{} image in {}x{} blocks",
                self.block_count,
                expected_blocks,
                self.width,
                self.height,
                self.block_width,
                self.block_height
            )));
        }

        if let Some(background) = &self.background {
            if background.len() != self.bytes_per_pixel() {
                return Err(invalid(format!(
                    "background pixel is {} bytes, pixels are {}",
                    background.len(),
                    self.bytes_per_pixel()
                )));
            }
        }

        let addressable = self
            .body_len()
            .and_then(|body| body.checked_add(HEADER_SIZE as u64))
            .and_then(|len| usize::try_from(len).ok());
        if addressable.is_none() {
            return Err(invalid(format!(
                "{} blocks of {}x{} pixels exceed the addressable file size",
                self.block_count, self.block_width, self.block_height
            )));
        }

        Ok(())
    }

    /// Encode the full header region, `HEADER_SIZE` bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        let (secs, nanos) = encode_time(self.source_mtime);

        buf[0..8].copy_from_slice(&CACHE_MAGIC);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        let flags = if self.background.is_some() {
            FLAG_BACKGROUND
        } else {
            0
        };
        buf[12..16].copy_from_slice(&flags.to_le_bytes());
        buf[16..24].copy_from_slice(&secs.to_le_bytes());
        buf[24..28].copy_from_slice(&nanos.to_le_bytes());
        buf[28..32].copy_from_slice(&self.width.to_le_bytes());
        buf[32..36].copy_from_slice(&self.height.to_le_bytes());
        buf[36..40].copy_from_slice(&self.block_width.to_le_bytes());
        buf[40..44].copy_from_slice(&self.block_height.to_le_bytes());
        buf[44] = self.format.bits_per_pixel() as u8;
        buf[45] = self.format.color_type.code();
        buf[46] = self.format.bit_depth;
        buf[48..56].copy_from_slice(&self.source_len.to_le_bytes());
        buf[56..64].copy_from_slice(&self.block_count.to_le_bytes());
        if let Some(background) = &self.background {
            buf[47] = background.len() as u8;
            buf[64..64 + background.len()].copy_from_slice(background.as_bytes());
        }

        buf
    }

    /// Bytes per stored pixel.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    /// Number of blocks across.
    #[inline]
    pub fn blocks_x(&self) -> u64 {
        block_grid_len(self.width, self.block_width)
    }

    /// Number of blocks down.
    #[inline]
    pub fn blocks_y(&self) -> u64 {
        block_grid_len(self.height, self.block_height)
    }

    /// Size of the block area in bytes, or `None` if it overflows.
    pub fn body_len(&self) -> Option<u64> {
        (self.block_width as u64)
            .checked_mul(self.block_height as u64)
            .and_then(|pixels| pixels.checked_mul(self.bytes_per_pixel() as u64))
            .and_then(|block| block.checked_mul(self.block_count))
    }

    /// Size of one block in bytes.
    ///
    /// The geometry helpers assume a header accepted by [`parse`](Self::parse)
    /// or built by [`new`](Self::new) from validated parameters.
    #[inline]
    pub fn block_bytes(&self) -> u64 {
        self.block_width as u64 * self.block_height as u64 * self.bytes_per_pixel() as u64
    }

    /// File offset of a block.
    #[inline]
    pub fn block_offset(&self, block_index: u64) -> u64 {
        HEADER_SIZE as u64 + block_index * self.block_bytes()
    }

    /// Total length of a complete cache file.
    #[inline]
    pub fn file_len(&self) -> u64 {
        self.block_offset(self.block_count)
    }

    /// Offset of source pixel `(x, y)` relative to the start of block data.
    ///
    /// The pixel must lie inside the image.
    #[inline]
    pub fn pixel_offset(&self, x: u64, y: u64) -> u64 {
        let bw = self.block_width as u64;
        let bh = self.block_height as u64;
        let block_index = (y / bh) * self.blocks_x() + (x / bw);
        let in_block = ((y % bh) * bw + (x % bw)) * self.bytes_per_pixel() as u64;
        block_index * self.block_bytes() + in_block
    }

    /// Pixel used wherever there is no source pixel: the background, or zero.
    pub fn fill_pixel(&self) -> Vec<u8> {
        match &self.background {
            Some(background) => background.as_bytes().to_vec(),
            None => vec![0u8; self.bytes_per_pixel()],
        }
    }
}

/// Number of blocks needed to cover `len` pixels.
#[inline]
fn block_grid_len(len: u32, block: u32) -> u64 {
    if block == 0 {
        return 0;
    }
    (len as u64).div_ceil(block as u64)
}

// =============================================================================
// Timestamps
// =============================================================================

/// Split a timestamp into whole seconds (floored) and nanoseconds.
fn encode_time(time: SystemTime) -> (i64, u32) {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => (after.as_secs() as i64, after.subsec_nanos()),
        Err(err) => {
            let before = err.duration();
            if before.subsec_nanos() == 0 {
                (-(before.as_secs() as i64), 0)
            } else {
                (
                    -(before.as_secs() as i64) - 1,
                    1_000_000_000 - before.subsec_nanos(),
                )
            }
        }
    }
}

fn decode_time(secs: i64, nanos: u32) -> Result<SystemTime, CacheError> {
    if nanos >= 1_000_000_000 {
        return Err(CacheError::InvalidGeometry(format!(
            "mtime nanoseconds out of range: {}",
            nanos
        )));
    }

    let time = if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::new(secs as u64, nanos))
    } else {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(secs.unsigned_abs()))
            .and_then(|t| t.checked_add(Duration::from_nanos(nanos as u64)))
    };

    time.ok_or_else(|| CacheError::InvalidGeometry(format!("mtime out of range: {}s", secs)))
}
