use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ParamsError;

/// Largest accepted tile width or height in pixels.
pub const MAX_TILE_DIMENSION: u32 = 8192;

/// Largest accepted zoom exponent, in absolute value.
pub const MAX_ZOOM: i32 = 16;

/// Default tile width and height.
pub const DEFAULT_TILE_SIZE: u32 = 256;

// =============================================================================
// Tile Format
// =============================================================================

/// Encoding of the bytes returned for a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    /// Flat row-major pixels in the cache's layout
    #[default]
    Raw,
    /// PNG in the cache's colour type and bit depth
    Png,
}

impl TileFormat {
    /// File extension for tiles written in this format.
    pub const fn extension(self) -> &'static str {
        match self {
            TileFormat::Raw => "raw",
            TileFormat::Png => "png",
        }
    }
}

impl FromStr for TileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(TileFormat::Raw),
            "png" => Ok(TileFormat::Png),
            other => Err(format!("unknown tile format '{}' (expected raw or png)", other)),
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// =============================================================================
// Tile Params
// =============================================================================

/// A tile request.
///
/// `x` and `y` address the zoomed coordinate space: at zoom `z` the image
/// spans `width * 2^z` by `height * 2^z` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileParams {
    /// Left edge in zoomed pixels
    pub x: u64,

    /// Top edge in zoomed pixels
    pub y: u64,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Zoom exponent: 0 native, positive magnifies, negative shrinks
    pub zoom: i32,

    /// Output encoding
    pub format: TileFormat,
}

impl Default for TileParams {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: DEFAULT_TILE_SIZE,
            height: DEFAULT_TILE_SIZE,
            zoom: 0,
            format: TileFormat::Raw,
        }
    }
}

impl TileParams {
    /// A native-resolution raw tile.
    pub fn new(x: u64, y: u64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            ..Self::default()
        }
    }

    /// Set the zoom exponent.
    pub fn zoom(mut self, zoom: i32) -> Self {
        self.zoom = zoom;
        self
    }

    /// Set the output encoding.
    pub fn format(mut self, format: TileFormat) -> Self {
        self.format = format;
        self
    }

    /// Check dimensions and zoom.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let valid = |side: u32| (1..=MAX_TILE_DIMENSION).contains(&side);
        if !valid(self.width) || !valid(self.height) {
            return Err(ParamsError::TileDimensions {
                width: self.width,
                height: self.height,
                max: MAX_TILE_DIMENSION,
            });
        }
        if !(-MAX_ZOOM..=MAX_ZOOM).contains(&self.zoom) {
            return Err(ParamsError::Zoom {
                zoom: self.zoom,
                max: MAX_ZOOM,
            });
        }
        Ok(())
    }
}
