//! Command-line configuration for the `pngtile` binary.
//!
//! Every option can also be set through a `PNGTILE_` environment variable.
//!
//! # Environment Variables
//!
//! - `PNGTILE_DEBUG` - Enable debug logging
//! - `PNGTILE_QUIET` - Only log warnings and errors
//! - `PNGTILE_BACKGROUND` - Background pixel as 2/4/6/8 hex digits
//! - `PNGTILE_BLOCK_SIZE` - Cache block edge length (default: 256)
//! - `PNGTILE_JOBS` - Images processed in parallel
//! - `PNGTILE_TIMEOUT` - Per-image time limit in seconds
//! - `PNGTILE_LOCK_TIMEOUT` - Wait for a concurrent update, in seconds (default: 30)
//! - `PNGTILE_PNG_COMPRESSION` - PNG tile compression: fast, balanced or best
//!
//! # Example
//!
//! ```text
//! pngtile --recursive maps/
//! pngtile --update --background ff000000 world.png
//! pngtile --tile-out tile.png --tile-format png --tile-zoom -2 --tile-random world.png
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::cache::{BackgroundPixel, ImageParams, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE};
use crate::io::DEFAULT_LOCK_TIMEOUT;
use crate::tile::{PngCompression, TileEncoder, TileFormat, TileParams, DEFAULT_TILE_SIZE};

// =============================================================================
// Default Values
// =============================================================================

/// Default number of images processed in parallel.
pub const DEFAULT_JOBS: usize = 4;

/// Default lock wait in seconds.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = DEFAULT_LOCK_TIMEOUT.as_secs();

// =============================================================================
// CLI Arguments
// =============================================================================

/// pngtile - Update PNG block caches and render tiles from them.
#[derive(Parser, Debug, Clone)]
#[command(name = "pngtile")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable debug logging.
    #[arg(long, default_value_t = false, env = "PNGTILE_DEBUG")]
    pub debug: bool,

    /// Only log warnings and errors.
    #[arg(short, long, default_value_t = false, env = "PNGTILE_QUIET")]
    pub quiet: bool,

    // =========================================================================
    // Input
    // =========================================================================
    /// Scan directories recursively for PNG files.
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// With --recursive, also process images whose cache is already fresh.
    #[arg(long, default_value_t = false)]
    pub include_cached: bool,

    /// Images, or directories with --recursive.
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    // =========================================================================
    // Cache
    // =========================================================================
    /// Rebuild caches even when they are fresh.
    #[arg(short, long, default_value_t = false)]
    pub update: bool,

    /// Background pixel for padding and transparent pixels (hex, one byte per channel).
    #[arg(long, env = "PNGTILE_BACKGROUND")]
    pub background: Option<BackgroundPixel>,

    /// Cache block width and height in pixels.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "PNGTILE_BLOCK_SIZE")]
    pub block_size: u32,

    /// Seconds to wait for a concurrent update of the same cache.
    #[arg(long, default_value_t = DEFAULT_LOCK_TIMEOUT_SECS, env = "PNGTILE_LOCK_TIMEOUT")]
    pub lock_timeout: u64,

    // =========================================================================
    // Tile
    // =========================================================================
    /// Render a tile to this file.
    #[arg(long)]
    pub tile_out: Option<PathBuf>,

    /// Tile width in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_width: u32,

    /// Tile height in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_height: u32,

    /// Tile left edge in zoomed pixels.
    #[arg(long, default_value_t = 0)]
    pub tile_x: u64,

    /// Tile top edge in zoomed pixels.
    #[arg(long, default_value_t = 0)]
    pub tile_y: u64,

    /// Tile zoom exponent (negative shrinks, positive magnifies).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub tile_zoom: i32,

    /// Pick the tile position at random within the image.
    #[arg(long, default_value_t = false)]
    pub tile_random: bool,

    /// Tile output encoding: raw or png.
    #[arg(long, default_value_t = TileFormat::Raw)]
    pub tile_format: TileFormat,

    /// PNG tile compression: fast, balanced or best.
    #[arg(long, default_value_t = PngCompression::Fast, env = "PNGTILE_PNG_COMPRESSION")]
    pub png_compression: PngCompression,

    // =========================================================================
    // Output & Runtime
    // =========================================================================
    /// Print image info as JSON lines.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Number of images processed in parallel.
    #[arg(short, long, default_value_t = DEFAULT_JOBS, env = "PNGTILE_JOBS")]
    pub jobs: usize,

    /// Give up on an image after this many seconds.
    #[arg(long, env = "PNGTILE_TIMEOUT")]
    pub timeout: Option<u64>,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.debug && self.quiet {
            return Err("--debug and --quiet are mutually exclusive".to_string());
        }

        if self.paths.is_empty() {
            return Err("At least one PATH is required".to_string());
        }

        if self.include_cached && !self.recursive {
            return Err("--include-cached only applies with --recursive".to_string());
        }

        if self.jobs == 0 {
            return Err("jobs must be greater than 0".to_string());
        }

        if self.timeout == Some(0) {
            return Err("timeout must be greater than 0".to_string());
        }

        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(format!(
                "block_size must be between 1 and {}",
                MAX_BLOCK_SIZE
            ));
        }

        if self.tile_out.is_some() && (self.recursive || self.paths.len() > 1) {
            return Err("--tile-out requires a single image PATH without --recursive".to_string());
        }

        self.tile_params().validate().map_err(|e| e.to_string())?;

        Ok(())
    }

    /// Cache build parameters.
    pub fn image_params(&self) -> ImageParams {
        ImageParams {
            background: self.background,
            block_width: self.block_size,
            block_height: self.block_size,
            lock_timeout: Duration::from_secs(self.lock_timeout),
        }
    }

    /// Tile request parameters, before any random placement.
    pub fn tile_params(&self) -> TileParams {
        TileParams {
            x: self.tile_x,
            y: self.tile_y,
            width: self.tile_width,
            height: self.tile_height,
            zoom: self.tile_zoom,
            format: self.tile_format,
        }
    }

    /// Encoder for tile output.
    pub fn tile_encoder(&self) -> TileEncoder {
        TileEncoder::with_compression(self.png_compression)
    }

    /// Per-image time limit.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================
