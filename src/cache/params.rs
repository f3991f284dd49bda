//! Build-time parameters.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ParamsError;
use crate::io::DEFAULT_LOCK_TIMEOUT;

/// Default block edge length in pixels.
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

/// Largest accepted block edge length in pixels.
pub const MAX_BLOCK_SIZE: u32 = 4096;

/// Largest background pixel, in bytes.
pub const MAX_BACKGROUND_BYTES: usize = 4;

// =============================================================================
// BackgroundPixel
// =============================================================================

/// A 1 to 4 byte pixel value used for padding and transparent pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundPixel {
    bytes: [u8; MAX_BACKGROUND_BYTES],
    len: u8,
}

impl BackgroundPixel {
    /// Create a background pixel from 1 to 4 raw bytes.
    pub fn new(bytes: &[u8]) -> Result<Self, ParamsError> {
        if bytes.is_empty() || bytes.len() > MAX_BACKGROUND_BYTES {
            return Err(ParamsError::Background {
                value: hex::encode(bytes),
                reason: format!("must be 1 to {} bytes", MAX_BACKGROUND_BYTES),
            });
        }

        let mut buf = [0u8; MAX_BACKGROUND_BYTES];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            bytes: buf,
            len: bytes.len() as u8,
        })
    }

    /// Pixel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Number of bytes in the pixel.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false; a background pixel has at least one byte.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl FromStr for BackgroundPixel {
    type Err = ParamsError;

    /// Parse 2, 4, 6 or 8 hex digits, one pair per channel (`"ff000000"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        if digits.is_empty() || digits.len() % 2 != 0 || digits.len() > 2 * MAX_BACKGROUND_BYTES {
            return Err(ParamsError::Background {
                value: s.to_string(),
                reason: "expected 2, 4, 6 or 8 hex digits".to_string(),
            });
        }

        let bytes = hex::decode(digits).map_err(|e| ParamsError::Background {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::new(&bytes)
    }
}

impl fmt::Display for BackgroundPixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for BackgroundPixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackgroundPixel({})", self)
    }
}

// =============================================================================
// ImageParams
// =============================================================================

/// Parameters for building a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParams {
    /// Pixel written outside the image and over fully transparent pixels
    pub background: Option<BackgroundPixel>,

    /// Block width in pixels
    pub block_width: u32,

    /// Block height in pixels
    pub block_height: u32,

    /// How long to wait for a concurrent update of the same cache
    pub lock_timeout: Duration,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            background: None,
            block_width: DEFAULT_BLOCK_SIZE,
            block_height: DEFAULT_BLOCK_SIZE,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl ImageParams {
    /// Default parameters with a background pixel.
    pub fn with_background(background: BackgroundPixel) -> Self {
        Self {
            background: Some(background),
            ..Self::default()
        }
    }

    /// Set the block geometry.
    pub fn block_size(mut self, width: u32, height: u32) -> Self {
        self.block_width = width;
        self.block_height = height;
        self
    }

    /// Check the block geometry.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let valid = |side: u32| (1..=MAX_BLOCK_SIZE).contains(&side);
        if !valid(self.block_width) || !valid(self.block_height) {
            return Err(ParamsError::BlockSize {
                width: self.block_width,
                height: self.block_height,
                max: MAX_BLOCK_SIZE,
            });
        }
        Ok(())
    }
}
