//! Cache freshness checks.
//!
//! Freshness is decided from metadata alone: the source file's `stat` and the
//! cache header. Pixel data is never read, so a check costs one `stat`, one
//! `open` and one short read regardless of image size.

use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::{CacheError, ImageError};

use super::header::{CacheHeader, HEADER_RECORD_SIZE};

/// State of a cache relative to its source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// No usable cache file
    Missing,
    /// Cache exists but does not describe the current source
    Stale,
    /// Cache matches the current source
    Fresh,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CacheStatus::Missing => "missing",
            CacheStatus::Stale => "stale",
            CacheStatus::Fresh => "fresh",
        })
    }
}

/// Classify the cache at `cache_path` against the source at `source_path`.
///
/// Missing or mismatched caches are normal results, not errors.
///
/// # Errors
/// - `NotFound` if the source does not exist
/// - `Io` if the source cannot be stat'ed
pub fn check_status(source_path: &Path, cache_path: &Path) -> Result<CacheStatus, ImageError> {
    let source = fs::metadata(source_path).map_err(|e| ImageError::io(source_path, e))?;

    let status = match read_cache_header(cache_path) {
        Ok((header, cache_len)) => classify(&header, &source, cache_len)
            .map_err(|e| ImageError::io(source_path, e))?,
        Err(CacheError::UnsupportedVersion { found, expected }) => {
            debug!(
                "{}: cache version {} != {}",
                cache_path.display(),
                found,
                expected
            );
            CacheStatus::Stale
        }
        Err(e) => {
            debug!("{}: no usable cache: {}", cache_path.display(), e);
            CacheStatus::Missing
        }
    };

    Ok(status)
}

/// Compare a parsed header against live source metadata.
///
/// `cache_len` is the current length of the cache file; a body shorter than
/// the header describes counts as stale.
pub fn classify(
    header: &CacheHeader,
    source: &Metadata,
    cache_len: u64,
) -> std::io::Result<CacheStatus> {
    let mtime = source.modified()?;

    if mtime != header.source_mtime {
        debug!(
            "source mtime {:?} != cached {:?}",
            mtime, header.source_mtime
        );
        return Ok(CacheStatus::Stale);
    }
    if source.len() != header.source_len {
        debug!("source length {} != cached {}", source.len(), header.source_len);
        return Ok(CacheStatus::Stale);
    }
    if cache_len < header.file_len() {
        debug!("cache length {} < expected {}", cache_len, header.file_len());
        return Ok(CacheStatus::Stale);
    }

    Ok(CacheStatus::Fresh)
}

/// Read and parse just the header record of a cache file.
///
/// Any failure to open or read is reported as `TooSmall`, which callers treat
/// the same as a missing cache.
fn read_cache_header(cache_path: &Path) -> Result<(CacheHeader, u64), CacheError> {
    let unreadable = |actual: u64| CacheError::TooSmall {
        required: HEADER_RECORD_SIZE as u64,
        actual,
    };

    let mut file = File::open(cache_path).map_err(|_| unreadable(0))?;
    let cache_len = file.metadata().map_err(|_| unreadable(0))?.len();

    let mut buf = [0u8; HEADER_RECORD_SIZE];
    file.read_exact(&mut buf)
        .map_err(|_| unreadable(cache_len))?;

    Ok((CacheHeader::parse(&buf)?, cache_len))
}
