//! Image handle state machine tests.
//!
//! Tests verify:
//! - Queries before open fail with NotOpen
//! - open() never rebuilds, even when stale
//! - update() opens the new cache
//! - close() releases the handle
//! - info() reports source and cache attributes

use std::fs;
use std::time::Duration;

use pngtile::{
    cache_path_for, scan_images, CacheStatus, Image, ImageError, ImageParams, ScanOptions,
    TileParams, CACHE_VERSION, HEADER_SIZE,
};

use super::test_utils::{bump_mtime, expected_gray_tile, write_gray_png, Fixture};

#[test]
fn test_queries_require_open() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 16, 16);

    let image = Image::new(&source);
    assert!(!image.is_open());
    assert!(matches!(image.info(), Err(ImageError::NotOpen)));
    assert!(matches!(
        image.tile(&TileParams::default()),
        Err(ImageError::NotOpen)
    ));

    // status() works in any state
    assert_eq!(image.status().unwrap(), CacheStatus::Missing);
}

#[test]
fn test_open_without_cache_is_not_found() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 16, 16);

    let mut image = Image::new(&source);
    assert!(matches!(image.open(), Err(ImageError::NotFound { .. })));
    assert!(!image.is_open());
    assert!(!image.cache_path().exists());
}

#[test]
fn test_update_open_close_cycle() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 40, 30);

    let mut image = Image::new(&source);
    image.update(&ImageParams::default()).unwrap();
    assert!(image.is_open());
    assert!(image.info().is_ok());

    image.close();
    assert!(!image.is_open());
    assert!(matches!(image.info(), Err(ImageError::NotOpen)));

    assert_eq!(image.open().unwrap(), CacheStatus::Fresh);
    let tile = image.tile(&TileParams::new(0, 0, 40, 30)).unwrap();
    assert_eq!(
        tile.as_ref(),
        expected_gray_tile((40, 30), 0, 0, 40, 30, 0).as_slice()
    );
}

#[test]
fn test_open_stale_does_not_rebuild() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 32, 32);

    let mut image = Image::new(&source);
    image.update(&ImageParams::default()).unwrap();
    image.close();

    let cache_before = fs::read(image.cache_path()).unwrap();
    bump_mtime(&source, Duration::from_secs(60));

    assert_eq!(image.open().unwrap(), CacheStatus::Stale);
    assert_eq!(image.info().unwrap().cache_status, CacheStatus::Stale);
    assert_eq!(fs::read(image.cache_path()).unwrap(), cache_before);
    assert_eq!(image.status().unwrap(), CacheStatus::Stale);

    // Stale caches still serve tiles
    assert!(image.tile(&TileParams::new(0, 0, 8, 8)).is_ok());

    image.update(&ImageParams::default()).unwrap();
    assert_eq!(image.info().unwrap().cache_status, CacheStatus::Fresh);
}

#[test]
fn test_info_reports_source_and_cache() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 300, 100);

    let mut image = Image::new(&source);
    image
        .update(&ImageParams::default().block_size(128, 128))
        .unwrap();
    let info = image.info().unwrap();

    let source_meta = fs::metadata(&source).unwrap();
    let cache_meta = fs::metadata(cache_path_for(&source)).unwrap();

    assert_eq!((info.image_width, info.image_height), (300, 100));
    assert_eq!(info.image_bpp, 8);
    assert_eq!(info.image_bytes, source_meta.len());
    assert_eq!(info.image_mtime, source_meta.modified().unwrap());
    assert_eq!(info.cache_bytes, cache_meta.len());
    assert_eq!(info.cache_mtime, cache_meta.modified().unwrap());
    assert_eq!(info.cache_version, CACHE_VERSION);
    assert_eq!(info.cache_blocks, 3);
    assert_eq!(info.cache_bytes, (HEADER_SIZE + 3 * 128 * 128) as u64);
    assert_eq!(info.cache_status, CacheStatus::Fresh);

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["image_width"], 300);
    assert_eq!(json["cache_status"], "fresh");
}

#[test]
fn test_explicit_cache_path() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    let cache = fixture.path("elsewhere/gray.bin");
    write_gray_png(&source, 16, 16);
    fs::create_dir_all(fixture.path("elsewhere")).unwrap();

    let mut image = Image::with_cache_path(&source, &cache);
    image.update(&ImageParams::default()).unwrap();

    assert!(cache.exists());
    assert!(!cache_path_for(&source).exists());
    assert_eq!(image.status().unwrap(), CacheStatus::Fresh);
}

#[test]
fn test_update_replaces_open_cache() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 64, 64);

    let mut image = Image::new(&source);
    image.update(&ImageParams::default()).unwrap();
    assert_eq!(image.header().unwrap().block_count, 1);

    image
        .update(&ImageParams::default().block_size(16, 16))
        .unwrap();
    assert_eq!(image.header().unwrap().block_count, 16);

    let tile = image.tile(&TileParams::new(10, 10, 30, 30)).unwrap();
    assert_eq!(
        tile.as_ref(),
        expected_gray_tile((64, 64), 10, 10, 30, 30, 0).as_slice()
    );
}

#[test]
fn test_scan_then_update() {
    let fixture = Fixture::new();
    fs::create_dir_all(fixture.path("nested")).unwrap();
    write_gray_png(&fixture.path("a.png"), 8, 8);
    write_gray_png(&fixture.path("nested/b.png"), 8, 8);

    let found: Vec<_> = scan_images(fixture.root(), &ScanOptions::default())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|i| i.status == CacheStatus::Missing));

    for scanned in &found {
        Image::new(&scanned.path)
            .update(&ImageParams::default())
            .unwrap();
    }

    // Everything is fresh now
    assert_eq!(
        scan_images(fixture.root(), &ScanOptions::default()).count(),
        0
    );
    assert_eq!(
        scan_images(
            fixture.root(),
            &ScanOptions {
                include_cached: true
            }
        )
        .count(),
        2
    );
}
