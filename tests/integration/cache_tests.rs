//! Cache build and freshness integration tests.
//!
//! Tests verify:
//! - Header contents and block layout of built caches
//! - Deterministic rebuilds
//! - Freshness tracking against source changes
//! - Atomic publish when a rebuild fails
//! - Per-cache locking

use std::fs;
use std::thread;
use std::time::Duration;

use pngtile::cache::{lock_path, temp_path, CacheHeader, CacheStatus, ImageParams, HEADER_SIZE};
use pngtile::io::CacheLock;
use pngtile::{
    cache_path_for, scan_images, BackgroundPixel, CacheError, ColorType, DecodeError, Image,
    ImageError, ParamsError, PixelFormat, ScanOptions,
};

use super::test_utils::{
    bump_mtime, gray_value, rgba_value, truncate_file, write_gray1_png, write_gray_png,
    write_half_transparent_png, write_palette_png, write_rgba_png, Fixture,
};

fn read_header(path: &std::path::Path) -> CacheHeader {
    CacheHeader::parse(&fs::read(path).unwrap()).unwrap()
}

// =============================================================================
// Layout
// =============================================================================

#[test]
fn test_gray_512_builds_four_blocks() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 512, 512);

    let mut image = Image::new(&source);
    image.update(&ImageParams::default()).unwrap();

    let cache = cache_path_for(&source);
    assert_eq!(cache, fixture.path("gray.cache"));

    let header = read_header(&cache);
    assert_eq!((header.width, header.height), (512, 512));
    assert_eq!(header.format.bits_per_pixel(), 8);
    assert_eq!((header.block_width, header.block_height), (256, 256));
    assert_eq!(header.block_count, 4);
    assert_eq!(header.background, None);
    assert_eq!(
        fs::metadata(&cache).unwrap().len(),
        (HEADER_SIZE + 4 * 256 * 256) as u64
    );

    // Block 1 is the top-right quadrant
    let bytes = fs::read(&cache).unwrap();
    let block1 = HEADER_SIZE + 256 * 256;
    assert_eq!(bytes[block1], gray_value(256, 0));
    assert_eq!(bytes[block1 + 256 + 1], gray_value(257, 1));
}

#[test]
fn test_background_pads_bottom_right_block() {
    let fixture = Fixture::new();
    let source = fixture.path("rgba.png");
    write_rgba_png(&source, 300, 300);

    let background: BackgroundPixel = "ff000000".parse().unwrap();
    let mut image = Image::new(&source);
    image
        .update(&ImageParams::with_background(background))
        .unwrap();

    let cache = cache_path_for(&source);
    let header = read_header(&cache);
    assert_eq!(header.block_count, 4);
    assert_eq!(header.background, Some(background));

    let bytes = fs::read(&cache).unwrap();
    let block = &bytes[header.block_offset(3) as usize..header.file_len() as usize];

    for row in 0..256u64 {
        for col in 0..256u64 {
            let offset = ((row * 256 + col) * 4) as usize;
            let pixel = &block[offset..offset + 4];
            if row < 44 && col < 44 {
                assert_eq!(pixel, rgba_value(256 + col, 256 + row), "({}, {})", col, row);
            } else {
                assert_eq!(pixel, [0xff, 0x00, 0x00, 0x00], "({}, {})", col, row);
            }
        }
    }
}

#[test]
fn test_background_replaces_transparent_pixels() {
    let fixture = Fixture::new();
    let source = fixture.path("half.png");
    write_half_transparent_png(&source, 8, 2);

    let background: BackgroundPixel = "00ff00ff".parse().unwrap();
    let mut image = Image::new(&source);
    image
        .update(&ImageParams::with_background(background).block_size(8, 2))
        .unwrap();

    let bytes = fs::read(cache_path_for(&source)).unwrap();
    let pixels = &bytes[HEADER_SIZE..HEADER_SIZE + 8 * 2 * 4];
    for (i, pixel) in pixels.chunks_exact(4).enumerate() {
        let (x, y) = ((i % 8) as u64, (i / 8) as u64);
        if x < 4 {
            assert_eq!(pixel, [0x00, 0xff, 0x00, 0xff]);
        } else {
            assert_eq!(pixel, rgba_value(x, y));
        }
    }
}

#[test]
fn test_background_length_mismatch() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 16, 16);

    let mut image = Image::new(&source);
    let result = image.update(&ImageParams::with_background("ff000000".parse().unwrap()));
    assert!(matches!(
        result,
        Err(ImageError::InvalidParams(ParamsError::BackgroundLength {
            expected: 1,
            actual: 4
        }))
    ));
    assert!(!cache_path_for(&source).exists());
    assert!(!temp_path(&cache_path_for(&source)).exists());
}

#[test]
fn test_low_bit_and_palette_are_expanded() {
    let fixture = Fixture::new();

    let gray1 = fixture.path("gray1.png");
    write_gray1_png(&gray1, 10, 3);
    Image::new(&gray1).update(&ImageParams::default()).unwrap();
    let header = read_header(&cache_path_for(&gray1));
    assert_eq!(header.format.color_type, ColorType::Gray);
    assert_eq!(header.format.bit_depth, 8);

    let bytes = fs::read(cache_path_for(&gray1)).unwrap();
    assert_eq!(bytes[HEADER_SIZE], 255);
    assert_eq!(bytes[HEADER_SIZE + 1], 0);

    let palette = fixture.path("palette.png");
    write_palette_png(&palette);
    Image::new(&palette).update(&ImageParams::default()).unwrap();
    let header = read_header(&cache_path_for(&palette));
    assert_eq!(header.format.color_type, ColorType::Rgb);
    assert_eq!(header.format.bits_per_pixel(), 24);

    let bytes = fs::read(cache_path_for(&palette)).unwrap();
    assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 6], &[255, 0, 0, 0, 0, 255]);
}

#[test]
fn test_rebuild_is_byte_identical() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 300, 200);
    let params = ImageParams::default().block_size(64, 48);

    let mut image = Image::new(&source);
    image.update(&params).unwrap();
    let first = fs::read(image.cache_path()).unwrap();

    image.update(&params).unwrap();
    let second = fs::read(image.cache_path()).unwrap();

    assert_eq!(first, second);
}

// =============================================================================
// Freshness
// =============================================================================

#[test]
fn test_status_lifecycle() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 64, 64);

    let mut image = Image::new(&source);
    assert_eq!(image.status().unwrap(), CacheStatus::Missing);

    image.update(&ImageParams::default()).unwrap();
    assert_eq!(image.status().unwrap(), CacheStatus::Fresh);
    assert_eq!(image.status().unwrap(), CacheStatus::Fresh);

    bump_mtime(&source, Duration::from_secs(5));
    assert_eq!(image.status().unwrap(), CacheStatus::Stale);

    image.update(&ImageParams::default()).unwrap();
    assert_eq!(image.status().unwrap(), CacheStatus::Fresh);
}

#[test]
fn test_status_missing_source() {
    let fixture = Fixture::new();
    let image = Image::new(fixture.path("absent.png"));
    assert!(matches!(image.status(), Err(ImageError::NotFound { .. })));
}

#[test]
fn test_version_bump_is_stale_and_refuses_open() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 32, 32);

    let mut image = Image::new(&source);
    image.update(&ImageParams::default()).unwrap();
    image.close();

    let cache = image.cache_path().to_path_buf();
    let mut bytes = fs::read(&cache).unwrap();
    bytes[8] = bytes[8].wrapping_add(1);
    fs::write(&cache, bytes).unwrap();

    assert_eq!(image.status().unwrap(), CacheStatus::Stale);
    assert!(matches!(
        image.open(),
        Err(ImageError::VersionMismatch { .. })
    ));
    assert!(!image.is_open());

    image.update(&ImageParams::default()).unwrap();
    assert_eq!(image.status().unwrap(), CacheStatus::Fresh);
}

#[test]
fn test_truncated_cache_is_stale() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 32, 32);

    let mut image = Image::new(&source);
    image.update(&ImageParams::default()).unwrap();
    image.close();

    let cache = image.cache_path().to_path_buf();
    let len = fs::metadata(&cache).unwrap().len();
    truncate_file(&cache, len - 1);

    assert_eq!(image.status().unwrap(), CacheStatus::Stale);
    assert!(matches!(image.open(), Err(ImageError::Cache(_))));
}

#[test]
fn test_garbage_cache_is_missing() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 32, 32);
    fs::write(cache_path_for(&source), b"definitely not a cache").unwrap();

    let mut image = Image::new(&source);
    assert_eq!(image.status().unwrap(), CacheStatus::Missing);
    assert!(matches!(image.open(), Err(ImageError::Cache(_))));
}

#[test]
fn test_oversized_block_geometry_is_missing() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 32, 32);
    let meta = fs::metadata(&source).unwrap();

    // Matches the live source, but its blocks cannot be addressed
    let header = CacheHeader::new(
        1,
        1,
        PixelFormat::new(ColorType::Rgba, 16).unwrap(),
        u32::MAX,
        u32::MAX,
        meta.modified().unwrap(),
        meta.len(),
        None,
    );
    fs::write(cache_path_for(&source), header.encode()).unwrap();

    let mut image = Image::new(&source);
    assert_eq!(image.status().unwrap(), CacheStatus::Missing);
    assert!(matches!(
        image.open(),
        Err(ImageError::Cache(CacheError::InvalidGeometry(_)))
    ));

    // A scan reports the image instead of failing
    let found: Vec<_> = scan_images(fixture.root(), &ScanOptions::default())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].status, CacheStatus::Missing);

    image.update(&ImageParams::default()).unwrap();
    assert_eq!(image.status().unwrap(), CacheStatus::Fresh);
}

// =============================================================================
// Failure Handling
// =============================================================================

#[test]
fn test_failed_update_keeps_previous_cache() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 512, 512);

    let mut image = Image::new(&source);
    image.update(&ImageParams::default()).unwrap();
    let cache = image.cache_path().to_path_buf();
    let published = fs::read(&cache).unwrap();

    // Cut the PNG mid-stream: the header decodes, the rows do not
    let png = fs::read(&source).unwrap();
    fs::write(&source, &png[..png.len() / 2]).unwrap();

    let result = image.update(&ImageParams::default());
    assert!(matches!(result, Err(ImageError::Decode(_))), "{:?}", result);

    assert_eq!(fs::read(&cache).unwrap(), published);
    assert!(!temp_path(&cache).exists());
    assert_eq!(image.status().unwrap(), CacheStatus::Stale);

    // The handle still serves the previous cache
    assert!(image.is_open());
    assert!(image.info().is_ok());
}

#[test]
fn test_not_a_png() {
    let fixture = Fixture::new();
    let source = fixture.path("fake.png");
    fs::write(&source, b"GIF89a not really").unwrap();

    let mut image = Image::new(&source);
    let result = image.update(&ImageParams::default());
    assert!(matches!(
        result,
        Err(ImageError::Decode(DecodeError::Png(_)))
    ));
    assert!(!image.cache_path().exists());
}

#[test]
fn test_update_missing_source() {
    let fixture = Fixture::new();
    let mut image = Image::new(fixture.path("absent.png"));
    assert!(matches!(
        image.update(&ImageParams::default()),
        Err(ImageError::NotFound { .. })
    ));
}

// =============================================================================
// Locking
// =============================================================================

#[test]
fn test_update_waits_for_lock_then_times_out() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 32, 32);

    let mut image = Image::new(&source);
    let _held = CacheLock::acquire(&lock_path(image.cache_path()), Duration::from_secs(1)).unwrap();

    let params = ImageParams {
        lock_timeout: Duration::from_millis(150),
        ..ImageParams::default()
    };
    let result = image.update(&params);
    assert!(matches!(result, Err(ImageError::LockTimeout { .. })));
    assert!(!image.cache_path().exists());
}

#[test]
fn test_update_proceeds_after_lock_release() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 32, 32);
    let cache = cache_path_for(&source);

    let held = CacheLock::acquire(&lock_path(&cache), Duration::from_secs(1)).unwrap();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        drop(held);
    });

    let mut image = Image::new(&source);
    image.update(&ImageParams::default()).unwrap();
    releaser.join().unwrap();

    assert_eq!(image.status().unwrap(), CacheStatus::Fresh);
}

#[test]
fn test_concurrent_updates_of_same_cache() {
    let fixture = Fixture::new();
    let source = fixture.path("gray.png");
    write_gray_png(&source, 256, 256);

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut image = Image::new(&source);
                image.update(&ImageParams::default().block_size(32, 32)).unwrap();
                assert_eq!(image.header().unwrap().block_count, 64);
            });
        }
    });

    assert_eq!(
        Image::new(&source).status().unwrap(),
        CacheStatus::Fresh
    );
    assert!(!temp_path(&cache_path_for(&source)).exists());
}
