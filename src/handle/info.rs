use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};

use crate::cache::CacheStatus;

/// Snapshot of a source image and its open cache, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    /// Image width in pixels
    pub image_width: u32,

    /// Image height in pixels
    pub image_height: u32,

    /// Bits per stored pixel
    pub image_bpp: u32,

    /// Source modification time
    #[serde(serialize_with = "unix_seconds")]
    pub image_mtime: SystemTime,

    /// Source length in bytes
    pub image_bytes: u64,

    /// Cache modification time
    #[serde(serialize_with = "unix_seconds")]
    pub cache_mtime: SystemTime,

    /// Cache length in bytes
    pub cache_bytes: u64,

    /// Cache format version
    pub cache_version: u32,

    /// Number of blocks in the cache
    pub cache_blocks: u64,

    /// Freshness observed when the cache was opened
    pub cache_status: CacheStatus,
}

/// Seconds since the Unix epoch, negative before it.
pub fn to_unix_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

fn unix_seconds<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(to_unix_seconds(*time))
}
