//! Block cache: on-disk layout, freshness checks and construction.
//!
//! A cache is a sibling file holding the decoded pixels of one PNG, split into
//! fixed-size blocks so that any pixel can be located with integer arithmetic
//! and read straight out of a memory map:
//!
//! - [`CacheHeader`] describes the layout and the source it was built from
//! - [`check_status`] compares a cache against its source
//! - [`build`] decodes a PNG and atomically publishes its cache
//! - [`CacheFile`] maps a published cache for reading

mod builder;
mod header;
mod params;
mod reader;
mod status;

pub use builder::{build, lock_path, temp_path, write_cache};
pub use header::{CacheHeader, CACHE_MAGIC, CACHE_VERSION, HEADER_RECORD_SIZE, HEADER_SIZE};
pub use params::{
    BackgroundPixel, ImageParams, DEFAULT_BLOCK_SIZE, MAX_BACKGROUND_BYTES, MAX_BLOCK_SIZE,
};
pub use reader::CacheFile;
pub use status::{check_status, classify, CacheStatus};
