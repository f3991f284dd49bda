use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Errors from parsing the on-disk cache header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Not enough bytes to hold a header
    #[error("Cache too small: need at least {required} bytes, got {actual}")]
    TooSmall { required: u64, actual: u64 },

    /// File does not start with the cache magic
    #[error("Incorrect cache magic: {0:02X?}")]
    BadMagic([u8; 8]),

    /// Header was written by a different format version
    #[error("Incompatible cache version: expected {expected}, got {found}")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Header fields are inconsistent with each other
    #[error("Invalid cache format: {0}")]
    InvalidGeometry(String),

    /// Body is shorter than the header says it should be
    #[error("Truncated cache: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },
}

/// Errors from decoding the source PNG.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Error reported by the PNG decoder (bad signature, CRC, zlib, I/O)
    #[error("PNG error: {0}")]
    Png(#[from] png::DecodingError),

    /// Adam7 interlaced images cannot be decoded scanline by scanline
    #[error("Unsupported image format with interlacing")]
    Interlaced,

    /// Decoder produced a pixel layout we do not store
    #[error("Unsupported pixel format: {color_type} at {bit_depth} bits per channel")]
    UnsupportedFormat { color_type: String, bit_depth: u8 },

    /// Stream ended before all rows were produced
    #[error("Truncated PNG stream: got {rows} of {height} rows")]
    Truncated { rows: u32, height: u32 },
}

/// Invalid build or tile parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// Tile width or height is zero or too large
    #[error("Invalid tile dimensions {width}x{height}: each side must be between 1 and {max}")]
    TileDimensions { width: u32, height: u32, max: u32 },

    /// Zoom exponent is outside the supported range
    #[error("Invalid zoom level {zoom}: must be between -{max} and {max}")]
    Zoom { zoom: i32, max: i32 },

    /// Background pixel string could not be parsed
    #[error("Invalid background pixel {value:?}: {reason}")]
    Background { value: String, reason: String },

    /// Background pixel does not match the image's pixel size
    #[error("Background pixel is {actual} bytes but the image has {expected} bytes per pixel")]
    BackgroundLength { expected: usize, actual: usize },

    /// Block width or height is zero or too large
    #[error("Invalid block size {width}x{height}: each side must be between 1 and {max}")]
    BlockSize { width: u32, height: u32, max: u32 },
}

/// Errors surfaced by the [`Image`](crate::handle::Image) handle.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Source or cache file is absent when required
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Malformed or unsupported PNG
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Read, write, rename or lock failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Tile dimensions, zoom, background pixel or block size rejected
    #[error("Invalid parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    /// Cache was written by another format version; call `update()`
    #[error("Cache version mismatch: expected {expected}, got {found}")]
    VersionMismatch { found: u32, expected: u32 },

    /// Cache file exists but cannot be used
    #[error("Cache error: {0}")]
    Cache(CacheError),

    /// Query issued before `open()` or `update()`
    #[error("Image is not open")]
    NotOpen,

    /// Another builder held the cache lock for too long
    #[error("Timed out after {timeout:?} waiting for cache lock {}", path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },

    /// Tile could not be encoded in the requested output format
    #[error("Encode error: {message}")]
    Encode { message: String },
}

impl ImageError {
    /// Wrap an I/O error, mapping `ErrorKind::NotFound` to [`ImageError::NotFound`].
    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ImageError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ImageError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Attribute a decoder failure to the source at `path`.
    ///
    /// Read failures of the source become [`ImageError::Io`]; a stream that
    /// ends early stays a decode error.
    pub fn decode(path: &Path, err: DecodeError) -> Self {
        match err {
            DecodeError::Png(png::DecodingError::IoError(source))
                if source.kind() != io::ErrorKind::UnexpectedEof =>
            {
                ImageError::io(path, source)
            }
            other => ImageError::Decode(other),
        }
    }
}

impl From<CacheError> for ImageError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::UnsupportedVersion { found, expected } => {
                ImageError::VersionMismatch { found, expected }
            }
            other => ImageError::Cache(other),
        }
    }
}
