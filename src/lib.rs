//! # pngtile
//!
//! A block cache for PNG images, and tile extraction from it.
//!
//! Decoding a large PNG is slow and strictly sequential, which makes it a poor
//! fit for serving small regions on demand. This library decodes each image
//! once into a sibling cache file of fixed-size pixel blocks; any rectangle at
//! any power-of-two zoom can then be copied straight out of a memory map.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`io`] - little-endian fields, per-cache advisory lock, read-only mapping
//! - [`mod@format`] - PNG scanline decoding and stored pixel layouts
//! - [`cache`] - cache file format, freshness checks and the cache builder
//! - [`tile`] - tile parameters, extraction and output encoding
//! - [`handle`] - the [`Image`] session object tying it all together
//! - [`scan`] - directory scanning for images
//! - [`config`] - CLI configuration for the `pngtile` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use pngtile::{BackgroundPixel, Image, ImageParams, TileFormat, TileParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut image = Image::new("maps/world.png");
//!
//! let background: BackgroundPixel = "ff000000".parse()?;
//! image.update(&ImageParams::with_background(background))?;
//!
//! let info = image.info()?;
//! println!("{}x{} in {} blocks", info.image_width, info.image_height, info.cache_blocks);
//!
//! let tile = image.tile(&TileParams::new(0, 0, 512, 512).zoom(-1).format(TileFormat::Png))?;
//! std::fs::write("tile.png", &tile)?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod handle;
pub mod io;
pub mod scan;
pub mod tile;

// Re-export commonly used types
pub use cache::{
    build, check_status, BackgroundPixel, CacheFile, CacheHeader, CacheStatus, ImageParams,
    CACHE_VERSION, HEADER_SIZE,
};
pub use config::Config;
pub use error::{CacheError, DecodeError, ImageError, ParamsError};
pub use format::{ColorType, PixelFormat, PngScanlines, ScanlineSource};
pub use handle::{cache_path_for, to_unix_seconds, Image, ImageInfo};
pub use scan::{scan_images, ScanImage, ScanOptions};
pub use tile::{
    extract, PngCompression, TileEncoder, TileFormat, TileParams, MAX_TILE_DIMENSION, MAX_ZOOM,
};
