//! Low-level file plumbing shared by the cache builder and readers.
//!
//! - [`endian`]: little-endian field decoding for the cache header
//! - [`CacheLock`]: per-cache advisory lock held while a cache is rebuilt
//! - [`MappedFile`]: read-only memory mapping used for concurrent tile reads

mod endian;
mod lock;
mod mapped;

pub use endian::{read_i64_le, read_u32_le, read_u64_le};
pub use lock::{CacheLock, DEFAULT_LOCK_TIMEOUT};
pub use mapped::MappedFile;
