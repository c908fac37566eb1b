//! Resource cache with an age-based, two-speed staleness policy.
//!
//! This module provides two interchangeable backends behind the
//! [`ResourceCache`] trait:
//!
//! - [`DiskCache`]: persistent, one file per entry, ages taken from file
//!   modification times, lazy eviction and bounded cleanup on write
//! - [`MemoryCache`]: in-process map, no persistence and no staleness

pub mod disk;
pub mod key;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub use crate::Error;

pub use disk::DiskCache;
pub use key::CacheKey;
pub use memory::MemoryCache;

/// Maximum number of deletions performed by the cleanup pass that runs
/// before every disk write.
pub const SAVE_CLEANUP_LIMIT: usize = 10;

/// Storage contract shared by the disk and memory backends.
#[async_trait]
pub trait ResourceCache: Send + Sync {
    /// Whether a usable entry exists for `key`.
    ///
    /// Backends with timestamps evict a stale entry when this returns false.
    async fn check(&self, key: &CacheKey, allow_too_old: bool, stable: bool) -> bool;

    /// Load the bytes stored for `key`, or `None` on a miss.
    async fn load(&self, key: &CacheKey, allow_too_old: bool, stable: bool) -> Result<Option<Bytes>, Error>;

    /// Store `data` under `key`, replacing any previous entry. Returns the
    /// number of bytes written.
    async fn save(&self, key: &CacheKey, data: &[u8]) -> Result<u64, Error>;

    /// Delete the entry for `key`. Returns whether something was removed.
    async fn remove(&self, key: &CacheKey) -> bool;

    /// Delete old entries (`only_old`) or every entry. Returns the number of
    /// entries removed.
    async fn clean(&self, only_old: bool) -> usize;
}

/// Time-to-live thresholds for "changing" and "stable" resources.
///
/// `None` means the resource never goes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staleness {
    pub changing: Option<Duration>,
    pub stable: Option<Duration>,
}

impl Staleness {
    /// Build from hour counts, where any negative value means "never stale".
    /// Counts too large to express in seconds are never stale as well.
    pub fn from_hours(changing: i64, stable: i64) -> Self {
        Self { changing: hours(changing), stable: hours(stable) }
    }

    /// Threshold selected by the per-call `stable` flag.
    pub fn threshold(&self, stable: bool) -> Option<Duration> {
        if stable { self.stable } else { self.changing }
    }
}

impl Default for Staleness {
    fn default() -> Self {
        Self::from_hours(24, 720)
    }
}

fn hours(value: i64) -> Option<Duration> {
    u64::try_from(value).ok()?.checked_mul(60 * 60).map(Duration::from_secs)
}
