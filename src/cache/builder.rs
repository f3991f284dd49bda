//! Cache construction.
//!
//! # Build Pipeline
//!
//! ```text
//!  source.png ──decode rows──▶ band buffer ──split──▶ blocks ──▶ <cache>.tmp
//!                              (block_height rows)                   │
//!                                                      header last ──┤
//!                                                      fsync         │
//!                                                      rename ──────▶ <cache>
//! ```
//!
//! Rows are decoded in a single forward pass. Only one band of
//! `block_height` rows is buffered at a time; once a band is full its blocks
//! are written out left to right. Because blocks are stored row-major, this
//! makes every write sequential.
//!
//! The header is written after the last block, and the finished file is only
//! renamed into place after it has been synced. The containing directory is
//! synced after the rename. A failed build removes the
//! temporary file and leaves any previously published cache untouched.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use tracing::{debug, info, warn};

use crate::error::{DecodeError, ImageError, ParamsError};
use crate::format::{PngScanlines, ScanlineSource};
use crate::io::CacheLock;

use super::header::{CacheHeader, HEADER_SIZE};
use super::params::ImageParams;

/// Path of the temporary file a cache is built in.
pub fn temp_path(cache_path: &Path) -> PathBuf {
    sibling(cache_path, ".tmp")
}

/// Path of the lock file guarding rebuilds of a cache.
pub fn lock_path(cache_path: &Path) -> PathBuf {
    sibling(cache_path, ".lock")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Build the cache for `source_path` and publish it at `cache_path`.
///
/// Holds the cache's advisory lock for the whole build, so concurrent updates
/// of the same cache run one after another.
///
/// # Errors
/// - `InvalidParams` for a bad block size or background pixel length
/// - `Decode` for malformed or unsupported PNGs
/// - `NotFound` / `Io` for filesystem failures
/// - `LockTimeout` if another update holds the lock for too long
pub fn build(
    source_path: &Path,
    cache_path: &Path,
    params: &ImageParams,
) -> Result<CacheHeader, ImageError> {
    params.validate()?;

    let start = Instant::now();
    let _lock = CacheLock::acquire(&lock_path(cache_path), params.lock_timeout)?;

    let file = File::open(source_path).map_err(|e| ImageError::io(source_path, e))?;
    let metadata = file.metadata().map_err(|e| ImageError::io(source_path, e))?;
    let mtime = metadata
        .modified()
        .map_err(|e| ImageError::io(source_path, e))?;
    let mut source = PngScanlines::new(BufReader::new(file))
        .map_err(|e| ImageError::decode(source_path, e))?;

    let tmp_path = temp_path(cache_path);
    let header = match write_temp(&mut source, &tmp_path, mtime, metadata.len(), params) {
        Ok(header) => header,
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(attribute_to_source(source_path, e));
        }
    };

    if let Err(e) = fs::rename(&tmp_path, cache_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(ImageError::io(cache_path, e));
    }
    // Already published; a failed directory sync only weakens crash durability.
    if let Err(e) = sync_parent_dir(cache_path) {
        warn!("{}: could not sync directory: {}", cache_path.display(), e);
    }

    info!(
        "{}: cache published ({}x{}@{}, {} blocks) in {:.2?}",
        cache_path.display(),
        header.width,
        header.height,
        header.format.bits_per_pixel(),
        header.block_count,
        start.elapsed()
    );

    Ok(header)
}

/// Flush the directory entry of `path` so a completed rename survives a crash.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Report decoder read failures against the source rather than as decode errors.
fn attribute_to_source(source_path: &Path, err: ImageError) -> ImageError {
    match err {
        ImageError::Decode(e) => ImageError::decode(source_path, e),
        other => other,
    }
}

/// Write a complete cache into `tmp_path` and sync it to disk.
fn write_temp<S: ScanlineSource>(
    source: &mut S,
    tmp_path: &Path,
    source_mtime: SystemTime,
    source_len: u64,
    params: &ImageParams,
) -> Result<CacheHeader, ImageError> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp_path)
        .map_err(|e| ImageError::io(tmp_path, e))?;

    let mut writer = BufWriter::new(file);
    let header = write_cache(source, &mut writer, tmp_path, source_mtime, source_len, params)?;

    let file = writer
        .into_inner()
        .map_err(|e| ImageError::io(tmp_path, e.into_error()))?;
    file.sync_all().map_err(|e| ImageError::io(tmp_path, e))?;

    Ok(header)
}

/// Decode `source` and write a complete cache to `writer`.
///
/// `target` only labels I/O errors. The header is written last, after every
/// block has been written successfully.
pub fn write_cache<S, W>(
    source: &mut S,
    writer: &mut W,
    target: &Path,
    source_mtime: SystemTime,
    source_len: u64,
    params: &ImageParams,
) -> Result<CacheHeader, ImageError>
where
    S: ScanlineSource,
    W: Write + Seek,
{
    let format = source.pixel_format();
    let bpp = format.bytes_per_pixel();

    if let Some(background) = &params.background {
        if background.len() != bpp {
            return Err(ParamsError::BackgroundLength {
                expected: bpp,
                actual: background.len(),
            }
            .into());
        }
    }

    let header = CacheHeader::new(
        source.width(),
        source.height(),
        format,
        params.block_width,
        params.block_height,
        source_mtime,
        source_len,
        params.background,
    );

    debug!(
        "{}x{} {} @ {} bits, {}x{} blocks of {}x{}",
        header.width,
        header.height,
        format.color_type.name(),
        format.bit_depth,
        header.blocks_x(),
        header.blocks_y(),
        header.block_width,
        header.block_height
    );

    let io_err = |e| ImageError::io(target, e);

    // Placeholder header; the real one goes in once the body is complete.
    writer.seek(SeekFrom::Start(0)).map_err(io_err)?;
    writer.write_all(&[0u8; HEADER_SIZE]).map_err(io_err)?;

    let fill = header.fill_pixel();
    let replace_transparent = params.background.is_some() && format.color_type.has_alpha();

    let width = header.width as usize;
    let height = header.height;
    let block_width = header.block_width as usize;
    let block_height = header.block_height as usize;
    let row_bytes = width * bpp;
    let block_row_bytes = block_width * bpp;
    let band_stride = header.blocks_x() as usize * block_row_bytes;

    let mut band = vec![0u8; band_stride * block_height];
    let mut rows_read: u32 = 0;

    for band_index in 0..header.blocks_y() {
        let band_top = band_index as usize * block_height;
        let rows_in_band = block_height.min(height as usize - band_top);

        for (r, band_row) in band.chunks_exact_mut(band_stride).enumerate() {
            if r >= rows_in_band {
                fill_pixels(band_row, &fill);
                continue;
            }

            let row = source
                .next_row()?
                .and_then(|row| row.get(..row_bytes))
                .ok_or(DecodeError::Truncated {
                    rows: rows_read,
                    height,
                })?;

            band_row[..row_bytes].copy_from_slice(row);
            if replace_transparent {
                for pixel in band_row[..row_bytes].chunks_exact_mut(bpp) {
                    if format.is_transparent(pixel) {
                        pixel.copy_from_slice(&fill);
                    }
                }
            }
            fill_pixels(&mut band_row[row_bytes..], &fill);
            rows_read += 1;
        }

        for block_x in 0..header.blocks_x() as usize {
            let left = block_x * block_row_bytes;
            for band_row in band.chunks_exact(band_stride) {
                writer
                    .write_all(&band_row[left..left + block_row_bytes])
                    .map_err(io_err)?;
            }
        }
    }

    writer.seek(SeekFrom::Start(0)).map_err(io_err)?;
    writer.write_all(&header.encode()).map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    Ok(header)
}

#[inline]
fn fill_pixels(dst: &mut [u8], pixel: &[u8]) {
    for chunk in dst.chunks_exact_mut(pixel.len()) {
        chunk.copy_from_slice(pixel);
    }
}
