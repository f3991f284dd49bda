//! Advisory locking for cache rebuilds.
//!
//! At most one builder may write a given cache at a time. The lock lives in a
//! sibling `<cache>.lock` file so that readers, which only ever open the
//! published cache, never contend with it. Locks are scoped per cache path;
//! rebuilding one image never blocks another.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::FileExt;
use tracing::{debug, warn};

use crate::error::ImageError;

/// Default time to wait for another builder to release the lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval while the lock is contended.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Contention shorter than this is not worth a warning.
const CONTENTION_WARN_AFTER: Duration = Duration::from_millis(500);

/// Exclusive advisory lock on a cache path.
///
/// Released when dropped.
#[derive(Debug)]
pub struct CacheLock {
    lock_path: PathBuf,
    file: File,
}

impl CacheLock {
    /// Acquire the lock, waiting up to `timeout` for a concurrent builder.
    ///
    /// # Errors
    /// - `LockTimeout` if the lock is still held after `timeout`
    /// - `Io` if the lock file cannot be created or locked
    pub fn acquire(lock_path: &Path, timeout: Duration) -> Result<Self, ImageError> {
        let start = Instant::now();
        let mut warned = false;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| ImageError::io(lock_path, e))?;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    if warned {
                        warn!(
                            "Lock acquired after {:.1}s contention: {}",
                            start.elapsed().as_secs_f64(),
                            lock_path.display()
                        );
                    } else {
                        debug!("Lock acquired: {}", lock_path.display());
                    }
                    return Ok(Self {
                        lock_path: lock_path.to_path_buf(),
                        file,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if !warned && start.elapsed() > CONTENTION_WARN_AFTER {
                        warn!(
                            "Lock contention on {}, waiting for another update...",
                            lock_path.display()
                        );
                        warned = true;
                    }
                }
                Err(e) => return Err(ImageError::io(lock_path, e)),
            }

            if start.elapsed() >= timeout {
                return Err(ImageError::LockTimeout {
                    path: lock_path.to_path_buf(),
                    timeout,
                });
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Get the lock file path.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        // Closing the file also releases the lock; unlock explicitly anyway so
        // the release does not depend on when the descriptor is reclaimed.
        let _ = FileExt::unlock(&self.file);
    }
}
