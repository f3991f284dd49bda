//! The per-image session object.
//!
//! # States
//!
//! ```text
//!            open()                          update()
//!  Closed ─────────────▶ Open { Fresh | Stale } ─────────▶ Open { Fresh }
//!    ▲  │                        │
//!    │  └───── update() ─────────┼────────────────────────▶ Open { Fresh }
//!    └──────── close() ──────────┘
//! ```
//!
//! `open()` never rebuilds; a stale cache stays stale until the caller asks
//! for `update()`.

use std::fs::File;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::cache::{self, CacheFile, CacheHeader, CacheStatus, ImageParams};
use crate::error::ImageError;
use crate::tile::{self, TileEncoder, TileParams};

use super::info::ImageInfo;

/// Extension used for derived cache paths.
pub const CACHE_EXTENSION: &str = "cache";

/// Cache path for a source image: the extension replaced with `.cache`, or
/// `.cache` appended when there is none.
pub fn cache_path_for(path: &Path) -> PathBuf {
    path.with_extension(CACHE_EXTENSION)
}

/// Resources held while an image is open.
#[derive(Debug)]
struct OpenImage {
    cache: CacheFile,
    source: File,
    status: CacheStatus,
}

#[derive(Debug)]
enum State {
    Closed,
    Open(OpenImage),
}

/// A source PNG and its block cache.
///
/// `status()` works in any state. `info()` and `tile()` need the image to be
/// open, via `open()` or `update()`. `tile()` takes `&self`, so an open image
/// can be shared across threads and queried concurrently.
#[derive(Debug)]
pub struct Image {
    path: PathBuf,
    cache_path: PathBuf,
    state: State,
    encoder: TileEncoder,
}

impl Image {
    /// A closed handle for `path`, caching next to it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache_path = cache_path_for(&path);
        Self::with_cache_path(path, cache_path)
    }

    /// A closed handle for `path` with an explicit cache location.
    pub fn with_cache_path(path: impl Into<PathBuf>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache_path: cache_path.into(),
            state: State::Closed,
            encoder: TileEncoder::new(),
        }
    }

    /// Use `encoder` for PNG tile output.
    pub fn with_encoder(mut self, encoder: TileEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Source image path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cache file path.
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Whether `open()` or `update()` has succeeded since the last `close()`.
    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Check the cache against the source. Does not change state.
    ///
    /// # Errors
    /// - `NotFound` if the source does not exist
    /// - `Io` if the source cannot be stat'ed
    pub fn status(&self) -> Result<CacheStatus, ImageError> {
        cache::check_status(&self.path, &self.cache_path)
    }

    /// Open the existing cache and the source, without rebuilding.
    ///
    /// Returns the cache's freshness, which may be `Stale`.
    ///
    /// # Errors
    /// - `NotFound` if the cache or the source does not exist
    /// - `VersionMismatch` if the cache has another format version
    /// - `Cache` if the cache is malformed or truncated
    pub fn open(&mut self) -> Result<CacheStatus, ImageError> {
        let opened = self.open_files()?;
        let status = opened.status;

        debug!("{}: opened cache ({})", self.path.display(), status);
        self.state = State::Open(opened);
        Ok(status)
    }

    /// Rebuild the cache from the source and open it.
    ///
    /// On failure the handle keeps its previous state and any previously
    /// published cache is left in place.
    ///
    /// # Errors
    /// - `InvalidParams` for a bad block size or background pixel
    /// - `Decode` for malformed or unsupported PNGs
    /// - `NotFound` / `Io` for filesystem failures
    /// - `LockTimeout` if another update of the same cache does not finish
    pub fn update(&mut self, params: &ImageParams) -> Result<(), ImageError> {
        cache::build(&self.path, &self.cache_path, params)?;

        let opened = self.open_files()?;
        debug!("{}: updated cache ({})", self.path.display(), opened.status);
        self.state = State::Open(opened);
        Ok(())
    }

    /// Release the cache mapping and source file.
    pub fn close(&mut self) {
        self.state = State::Closed;
    }

    /// Report on the open image and cache.
    ///
    /// # Errors
    /// - `NotOpen` if the image is not open
    /// - `Io` if the source can no longer be stat'ed
    pub fn info(&self) -> Result<ImageInfo, ImageError> {
        let open = self.open_image()?;
        let header = open.cache.header();

        let source = open
            .source
            .metadata()
            .map_err(|e| ImageError::io(&self.path, e))?;
        let cache = open.cache.metadata();

        Ok(ImageInfo {
            image_width: header.width,
            image_height: header.height,
            image_bpp: header.format.bits_per_pixel(),
            image_mtime: source
                .modified()
                .map_err(|e| ImageError::io(&self.path, e))?,
            image_bytes: source.len(),
            cache_mtime: cache
                .modified()
                .map_err(|e| ImageError::io(&self.cache_path, e))?,
            cache_bytes: cache.len(),
            cache_version: header.version,
            cache_blocks: header.block_count,
            cache_status: open.status,
        })
    }

    /// Header of the open cache.
    pub fn header(&self) -> Result<&CacheHeader, ImageError> {
        Ok(self.open_image()?.cache.header())
    }

    /// Render a tile from the open cache.
    ///
    /// Either the complete tile is returned or an error; there is no partial
    /// output.
    ///
    /// # Errors
    /// - `NotOpen` if the image is not open
    /// - `InvalidParams` for zero, oversized or out-of-range parameters
    /// - `Encode` if PNG output fails
    pub fn tile(&self, params: &TileParams) -> Result<Bytes, ImageError> {
        let open = self.open_image()?;
        let header = open.cache.header();

        let pixels = tile::extract(header, open.cache.blocks(), params)?;
        self.encoder
            .encode(pixels, params.width, params.height, header.format, params.format)
    }

    fn open_image(&self) -> Result<&OpenImage, ImageError> {
        match &self.state {
            State::Open(open) => Ok(open),
            State::Closed => Err(ImageError::NotOpen),
        }
    }

    fn open_files(&self) -> Result<OpenImage, ImageError> {
        let cache = CacheFile::open(&self.cache_path)?;
        let source = File::open(&self.path).map_err(|e| ImageError::io(&self.path, e))?;
        let metadata = source
            .metadata()
            .map_err(|e| ImageError::io(&self.path, e))?;

        let status = cache::classify(cache.header(), &metadata, cache.metadata().len())
            .map_err(|e| ImageError::io(&self.path, e))?;

        Ok(OpenImage {
            cache,
            source,
            status,
        })
    }
}
