//! pngtile - Update PNG block caches and render tiles from them.
//!
//! Each image is processed on the blocking thread pool; a failed image is
//! logged and the rest of the batch carries on.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pngtile::{
    scan_images, to_unix_seconds, CacheStatus, Config, Image, ImageError, ImageInfo, ScanOptions,
};

/// Why processing one image failed.
#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Write --tile-out={}: {source}", path.display())]
    WriteTile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Worker failed: {0}")]
    Worker(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.debug, config.quiet);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let config = Arc::new(config);

    let scan_config = Arc::clone(&config);
    let scanned = tokio::task::spawn_blocking(move || collect_paths(&scan_config)).await;
    let (paths, scan_failures) = match scanned {
        Ok(collected) => collected,
        Err(e) => {
            error!("Scan failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let failures = scan_failures + run_batch(config, paths).await;

    if failures > 0 {
        error!("{} failure(s)", failures);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Batch
// =============================================================================

/// Expand the command-line paths into image paths.
///
/// Returns the images and the number of scan errors, which have been logged.
fn collect_paths(config: &Config) -> (Vec<PathBuf>, usize) {
    if !config.recursive {
        return (config.paths.clone(), 0);
    }

    let options = ScanOptions {
        include_cached: config.include_cached,
    };

    let mut paths = Vec::new();
    let mut failures = 0;
    for root in &config.paths {
        info!("{}...", root.display());

        for result in scan_images(root, &options) {
            match result {
                Ok(image) => {
                    debug!("{}: found ({})", image.path.display(), image.status);
                    paths.push(image.path);
                }
                Err(e) => {
                    error!("Scan {}: {}", root.display(), e);
                    failures += 1;
                }
            }
        }
    }

    (paths, failures)
}

/// Process every path, at most `config.jobs` at a time. Returns the failure count.
async fn run_batch(config: Arc<Config>, paths: Vec<PathBuf>) -> usize {
    let semaphore = Arc::new(Semaphore::new(config.jobs));
    let mut tasks = JoinSet::new();

    for path in paths {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let config = Arc::clone(&config);

        tasks.spawn(async move {
            let worker_path = path.clone();
            let worker_config = Arc::clone(&config);
            let work = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                run(&worker_config, &worker_path)
            });

            let joined = match config.timeout() {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(joined) => joined,
                    // The worker keeps its permit until it finishes; only the
                    // result is abandoned.
                    Err(_) => return (path, Err(RunError::TimedOut(limit))),
                },
                None => work.await,
            };

            let result = joined.unwrap_or_else(|e| Err(RunError::Worker(e.to_string())));
            (path, result)
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((path, Err(e))) => {
                error!("{}: {}", path.display(), e);
                failures += 1;
            }
            Err(e) => {
                error!("Task failed: {}", e);
                failures += 1;
            }
        }
    }

    failures
}

// =============================================================================
// Per Image
// =============================================================================

fn run(config: &Config, path: &Path) -> Result<(), RunError> {
    let mut image = Image::new(path).with_encoder(config.tile_encoder());

    let status = image.status()?;
    if status != CacheStatus::Fresh || config.update {
        info!("{}: cache update (status {})", path.display(), status);
        image.update(&config.image_params())?;
    } else {
        info!("{}: cache fresh", path.display());
        image.open()?;
    }

    let info = image.info()?;
    print_info(path, &info, config.json)?;

    if let Some(tile_out) = &config.tile_out {
        let mut params = config.tile_params();
        if config.tile_random {
            let mut rng = rand::thread_rng();
            params.x = rng.gen_range(0..info.image_width as u64);
            params.y = rng.gen_range(0..info.image_height as u64);
        }

        let tile = image.tile(&params)?;
        std::fs::write(tile_out, &tile).map_err(|source| RunError::WriteTile {
            path: tile_out.clone(),
            source,
        })?;

        info!(
            "{}: render {}x{} tile at {}x{}@{} to {}",
            path.display(),
            params.width,
            params.height,
            params.x,
            params.y,
            params.zoom,
            tile_out.display()
        );
    }

    Ok(())
}

#[derive(Serialize)]
struct Report<'a> {
    path: &'a Path,
    #[serde(flatten)]
    info: &'a ImageInfo,
}

fn print_info(path: &Path, info: &ImageInfo, json: bool) -> Result<(), RunError> {
    if json {
        println!("{}", serde_json::to_string(&Report { path, info })?);
        return Ok(());
    }

    println!(
        "{}:\n\
         \tImage: {}x{}@{}\n\
         \tImage mtime={:.3} bytes={}\n\
         \tCache mtime={:.3} bytes={} version={} blocks={} status={}",
        path.display(),
        info.image_width,
        info.image_height,
        info.image_bpp,
        to_unix_seconds(info.image_mtime),
        info.image_bytes,
        to_unix_seconds(info.cache_mtime),
        info.cache_bytes,
        info.cache_version,
        info.cache_blocks,
        info.cache_status
    );
    Ok(())
}

// =============================================================================
// Logging
// =============================================================================

/// Initialize the tracing subscriber on stderr; `RUST_LOG` overrides the level.
fn init_logging(debug: bool, quiet: bool) {
    let env_filter = if debug {
        "pngtile=debug"
    } else if quiet {
        "pngtile=warn"
    } else {
        "pngtile=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
