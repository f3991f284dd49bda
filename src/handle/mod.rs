//! Image handle: the public entry point.
//!
//! An [`Image`] ties a source PNG to its cache file and exposes the cache
//! lifecycle (`status`, `open`, `update`, `close`) and the queries served from
//! an open cache (`info`, `tile`).
//!
//! # Example
//!
//! ```no_run
//! use pngtile::{CacheStatus, Image, ImageParams, TileParams};
//!
//! # fn main() -> Result<(), pngtile::ImageError> {
//! let mut image = Image::new("maps/world.png");
//!
//! if image.status()? == CacheStatus::Fresh {
//!     image.open()?;
//! } else {
//!     image.update(&ImageParams::default())?;
//! }
//!
//! let tile = image.tile(&TileParams::new(1024, 512, 256, 256))?;
//! println!("{} bytes", tile.len());
//! # Ok(())
//! # }
//! ```

mod image;
mod info;

pub use self::image::{cache_path_for, Image, CACHE_EXTENSION};
pub use self::info::{to_unix_seconds, ImageInfo};
