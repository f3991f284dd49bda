//! Tile extraction.
//!
//! A tile is a rectangle of the image at some zoom level, read straight out of
//! a cache's block area:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               TileParams                │
//! │        x, y, width, height, zoom        │
//! └────────────────────┬────────────────────┘
//!                      │ validate
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                extract()                │
//! │  zoomed coords → source pixel → block   │
//! │  out of bounds → fill pixel             │
//! └────────────────────┬────────────────────┘
//!                      │ flat pixels
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TileEncoder               │
//! │              raw  |  png                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileParams`]: position, size, zoom and output format of a tile
//! - [`extract`]: copies pixels from block data into a row-major buffer
//! - [`TileEncoder`]: turns the buffer into the requested output bytes

mod encoder;
mod extract;
mod params;

pub use encoder::{PngCompression, TileEncoder};
pub use extract::extract;
pub use params::{TileFormat, TileParams, DEFAULT_TILE_SIZE, MAX_TILE_DIMENSION, MAX_ZOOM};
