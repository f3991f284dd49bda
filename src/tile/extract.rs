//! Tile extraction from block data.
//!
//! # Coordinate Mapping
//!
//! Output pixel `(col, row)` of a tile addresses zoomed coordinate
//! `(x + col, y + row)`, which maps to a source pixel per axis:
//!
//! ```text
//! zoom > 0:  source = zoomed >> zoom     (each source pixel repeated 2^zoom times)
//! zoom = 0:  source = zoomed
//! zoom < 0:  source = zoomed << -zoom    (top-left pixel of each 2^-zoom square)
//! ```
//!
//! Source coordinates outside the image produce the header's fill pixel, so a
//! tile may straddle or lie entirely past the image edge.

use crate::cache::CacheHeader;
use crate::error::{CacheError, ImageError};

use super::params::TileParams;

/// Extract a tile as a flat row-major buffer of
/// `width * height * bytes_per_pixel` bytes.
///
/// `blocks` is the block area of a cache described by `header`.
///
/// # Errors
/// - `InvalidParams` if the tile dimensions or zoom are out of range
/// - `Cache` if the header geometry is inconsistent or `blocks` is shorter
///   than the header describes
pub fn extract(
    header: &CacheHeader,
    blocks: &[u8],
    params: &TileParams,
) -> Result<Vec<u8>, ImageError> {
    params.validate()?;
    header.validate()?;

    let expected = header.block_count * header.block_bytes();
    if (blocks.len() as u64) < expected {
        return Err(CacheError::Truncated {
            expected,
            actual: blocks.len() as u64,
        }
        .into());
    }

    let bpp = header.bytes_per_pixel();
    let fill = header.fill_pixel();
    let stride = params.width as usize * bpp;
    let mut out = vec![0u8; stride * params.height as usize];

    for (row, out_row) in out.chunks_exact_mut(stride).enumerate() {
        let source_y = params
            .y
            .checked_add(row as u64)
            .and_then(|y| to_source(y, params.zoom))
            .filter(|&y| y < header.height as u64);

        match source_y {
            None => fill_row(out_row, &fill),
            Some(sy) if params.zoom == 0 => {
                copy_row_runs(header, blocks, params.x, sy, out_row, &fill)
            }
            Some(sy) => copy_row_sampled(header, blocks, params, sy, out_row, &fill),
        }
    }

    Ok(out)
}

/// Map a zoomed coordinate to a source coordinate; `None` if it overflows.
#[inline]
fn to_source(zoomed: u64, zoom: i32) -> Option<u64> {
    if zoom >= 0 {
        Some(zoomed >> zoom)
    } else {
        zoomed.checked_mul(1u64 << (-zoom))
    }
}

#[inline]
fn fill_row(dst: &mut [u8], pixel: &[u8]) {
    for chunk in dst.chunks_exact_mut(pixel.len()) {
        chunk.copy_from_slice(pixel);
    }
}

/// Native resolution: copy contiguous runs, one per intersected block.
fn copy_row_runs(
    header: &CacheHeader,
    blocks: &[u8],
    x: u64,
    sy: u64,
    out_row: &mut [u8],
    fill: &[u8],
) {
    let bpp = fill.len();
    let block_width = header.block_width as u64;
    let tile_width = (out_row.len() / bpp) as u64;
    let inside = (header.width as u64).saturating_sub(x).min(tile_width);

    let mut col = 0u64;
    while col < inside {
        let sx = x + col;
        let run = (block_width - sx % block_width).min(inside - col);

        let src = header.pixel_offset(sx, sy) as usize;
        let dst = col as usize * bpp;
        let len = run as usize * bpp;
        out_row[dst..dst + len].copy_from_slice(&blocks[src..src + len]);

        col += run;
    }

    fill_row(&mut out_row[inside as usize * bpp..], fill);
}

/// Zoomed: look up the source pixel of every output pixel.
fn copy_row_sampled(
    header: &CacheHeader,
    blocks: &[u8],
    params: &TileParams,
    sy: u64,
    out_row: &mut [u8],
    fill: &[u8],
) {
    let bpp = fill.len();
    let width = header.width as u64;

    for (col, pixel) in out_row.chunks_exact_mut(bpp).enumerate() {
        let source_x = params
            .x
            .checked_add(col as u64)
            .and_then(|x| to_source(x, params.zoom))
            .filter(|&x| x < width);

        match source_x {
            Some(sx) => {
                let src = header.pixel_offset(sx, sy) as usize;
                pixel.copy_from_slice(&blocks[src..src + bpp]);
            }
            None => pixel.copy_from_slice(fill),
        }
    }
}
