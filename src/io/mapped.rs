use std::fs::{File, Metadata};
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

use crate::error::ImageError;

/// A read-only memory mapping of a whole file.
///
/// Readers share the mapping rather than a file cursor, so any number of
/// threads can read from one `MappedFile` at once. Caches are only ever
/// replaced by renaming a new file over the old path; a mapping therefore
/// keeps seeing the complete file it was opened on.
#[derive(Debug)]
pub struct MappedFile {
    metadata: Metadata,
    map: Mmap,
}

impl MappedFile {
    /// Open and map `path` read-only.
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let file = File::open(path).map_err(|e| ImageError::io(path, e))?;
        let metadata = file.metadata().map_err(|e| ImageError::io(path, e))?;

        // SAFETY: published caches are never modified in place (rebuilds write
        // a temporary file and rename it over this path), so the mapped pages
        // cannot change underneath the returned slice.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| ImageError::io(path, e))?;

        Ok(Self {
            metadata,
            map,
        })
    }

    /// Metadata of the mapped file, captured at open time.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl Deref for MappedFile {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}
