//! Test utilities for integration tests.
//!
//! Fixture PNGs are generated on the fly into temporary directories. Pixel
//! values follow simple patterns so expected tile contents can be computed
//! instead of stored.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{GrayImage, ImageBuffer, Luma, Rgb, Rgba, RgbaImage};
use tempfile::TempDir;

// =============================================================================
// Fixture Directory
// =============================================================================

/// A temporary directory that is removed on drop.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

// =============================================================================
// Pixel Patterns
// =============================================================================

/// Grayscale value of pixel (x, y).
pub fn gray_value(x: u64, y: u64) -> u8 {
    ((x * 7 + y * 13) % 251) as u8
}

/// Opaque RGBA value of pixel (x, y).
pub fn rgba_value(x: u64, y: u64) -> [u8; 4] {
    [(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255]
}

/// 16-bit RGB value of pixel (x, y).
pub fn rgb16_value(x: u64, y: u64) -> [u16; 3] {
    [(x * 300) as u16, (y * 500) as u16, 0xABCD]
}

/// Expected raw gray tile at native zoom: source pixels where in bounds,
/// `fill` elsewhere.
pub fn expected_gray_tile(
    image_size: (u32, u32),
    x: u64,
    y: u64,
    width: u32,
    height: u32,
    fill: u8,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for row in 0..height as u64 {
        for col in 0..width as u64 {
            let (sx, sy) = (x + col, y + row);
            if sx < image_size.0 as u64 && sy < image_size.1 as u64 {
                out.push(gray_value(sx, sy));
            } else {
                out.push(fill);
            }
        }
    }
    out
}

// =============================================================================
// PNG Writers
// =============================================================================

/// Write an 8-bit grayscale PNG following [`gray_value`].
pub fn write_gray_png(path: &Path, width: u32, height: u32) {
    GrayImage::from_fn(width, height, |x, y| Luma([gray_value(x as u64, y as u64)]))
        .save(path)
        .expect("write gray PNG");
}

/// Write an opaque 8-bit RGBA PNG following [`rgba_value`].
pub fn write_rgba_png(path: &Path, width: u32, height: u32) {
    RgbaImage::from_fn(width, height, |x, y| Rgba(rgba_value(x as u64, y as u64)))
        .save(path)
        .expect("write RGBA PNG");
}

/// Write an RGBA PNG whose left half is fully transparent.
pub fn write_half_transparent_png(path: &Path, width: u32, height: u32) {
    RgbaImage::from_fn(width, height, |x, y| {
        if x < width / 2 {
            Rgba([10, 20, 30, 0])
        } else {
            Rgba(rgba_value(x as u64, y as u64))
        }
    })
    .save(path)
    .expect("write RGBA PNG");
}

/// Write a 16-bit RGB PNG following [`rgb16_value`].
pub fn write_rgb16_png(path: &Path, width: u32, height: u32) {
    ImageBuffer::<Rgb<u16>, Vec<u16>>::from_fn(width, height, |x, y| {
        Rgb(rgb16_value(x as u64, y as u64))
    })
    .save(path)
    .expect("write RGB16 PNG");
}

/// Write a 1-bit grayscale PNG: a checkerboard of single pixels.
pub fn write_gray1_png(path: &Path, width: u32, height: u32) {
    let row_bytes = (width as usize).div_ceil(8);
    let mut data = vec![0u8; row_bytes * height as usize];
    for y in 0..height as usize {
        for x in 0..width as usize {
            if (x + y) % 2 == 0 {
                data[y * row_bytes + x / 8] |= 0x80 >> (x % 8);
            }
        }
    }

    let file = BufWriter::new(File::create(path).expect("create PNG"));
    let mut encoder = png::Encoder::new(file, width, height);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::One);
    let mut writer = encoder.write_header().expect("write header");
    writer.write_image_data(&data).expect("write data");
}

/// Write a 2x1 palette PNG with entries red and blue.
pub fn write_palette_png(path: &Path) {
    let file = BufWriter::new(File::create(path).expect("create PNG"));
    let mut encoder = png::Encoder::new(file, 2, 1);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(vec![255, 0, 0, 0, 0, 255]);
    let mut writer = encoder.write_header().expect("write header");
    writer.write_image_data(&[0, 1]).expect("write data");
}

// =============================================================================
// File Helpers
// =============================================================================

/// Move a file's modification time forward without touching its contents.
pub fn bump_mtime(path: &Path, by: Duration) {
    let modified = fs::metadata(path).unwrap().modified().unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(modified + by)
        .unwrap();
}

/// Cut a file down to `len` bytes.
pub fn truncate_file(path: &Path, len: u64) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_len(len)
        .unwrap();
}
