use std::fs::Metadata;
use std::path::Path;

use crate::error::{CacheError, ImageError};
use crate::io::MappedFile;

use super::header::{CacheHeader, HEADER_SIZE};

/// A published cache, mapped read-only.
#[derive(Debug)]
pub struct CacheFile {
    header: CacheHeader,
    mapped: MappedFile,
}

impl CacheFile {
    /// Map a cache file and validate its header and length.
    ///
    /// # Errors
    /// - `NotFound` if there is no cache file
    /// - `VersionMismatch` if it was written by another format version
    /// - `Cache` if the header is malformed or the body is truncated
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let mapped = MappedFile::open(path)?;
        let header = CacheHeader::parse(&mapped)?;

        let expected = header.file_len();
        let actual = mapped.len() as u64;
        if actual < expected {
            return Err(CacheError::Truncated { expected, actual }.into());
        }

        Ok(Self { header, mapped })
    }

    /// The parsed header.
    pub fn header(&self) -> &CacheHeader {
        &self.header
    }

    /// All block data, starting with block 0.
    pub fn blocks(&self) -> &[u8] {
        &self.mapped[HEADER_SIZE..self.header.file_len() as usize]
    }

    /// Metadata of the cache file at the time it was opened.
    pub fn metadata(&self) -> &Metadata {
        self.mapped.metadata()
    }
}
