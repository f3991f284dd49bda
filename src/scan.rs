//! Directory scanning for candidate images.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cache::{check_status, CacheStatus};
use crate::error::ImageError;
use crate::handle::cache_path_for;

/// Extension of source images, matched case-insensitively.
pub const IMAGE_EXTENSION: &str = "png";

/// Options for [`scan_images`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Also yield images whose cache is already fresh
    pub include_cached: bool,
}

/// An image found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanImage {
    /// Source image path
    pub path: PathBuf,

    /// Cache status at scan time
    pub status: CacheStatus,
}

/// Lazily walk `root` for PNG files.
///
/// Images with a fresh cache are skipped unless `include_cached` is set.
/// Unreadable directory entries are yielded as errors; the walk continues past
/// them. Each call starts a new walk.
pub fn scan_images(
    root: &Path,
    options: &ScanOptions,
) -> impl Iterator<Item = Result<ScanImage, ImageError>> {
    let include_cached = options.include_cached;
    let root = root.to_path_buf();

    WalkDir::new(&root)
        .follow_links(true)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root.as_path()).to_path_buf();
                    return Some(Err(ImageError::io(&path, e.into())));
                }
            };

            if !entry.file_type().is_file() || !is_image(entry.path()) {
                return None;
            }

            let path = entry.into_path();
            let status = match check_status(&path, &cache_path_for(&path)) {
                Ok(status) => status,
                Err(e) => return Some(Err(e)),
            };

            if status == CacheStatus::Fresh && !include_cached {
                return None;
            }
            Some(Ok(ScanImage { path, status }))
        })
}

/// Whether `path` has the image extension.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(IMAGE_EXTENSION))
        .unwrap_or(false)
}
