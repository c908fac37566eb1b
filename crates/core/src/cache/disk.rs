//! Disk-backed resource cache.
//!
//! Every entry is a single file under the cache root, addressed by
//! [`CacheKey::relative_path`]. The file modification time is the entry's
//! age; staleness is evaluated on access and never stored.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;

use super::{CacheKey, ResourceCache, SAVE_CLEANUP_LIMIT, Staleness};
use crate::Error;

/// Persistent cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
    staleness: Staleness,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheDir` if the directory cannot be created or is
    /// not a directory afterwards.
    pub fn new(root: impl AsRef<Path>, staleness: Staleness) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();

        // Runs once at startup, not worth making the constructor async.
        if let Err(e) = std::fs::create_dir_all(&root) {
            return Err(Error::CacheDir { path: root, reason: e.to_string() });
        }
        if !root.is_dir() {
            return Err(Error::CacheDir { path: root, reason: "not a directory".into() });
        }

        tracing::debug!(root = %root.display(), ?staleness, "disk cache opened");
        Ok(Self { root, staleness })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staleness(&self) -> Staleness {
        self.staleness
    }

    /// Absolute path of the file backing `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Last write time of the entry for `key`, if it exists.
    pub async fn modified(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        let metadata = fs::metadata(self.path_for(key)).await.ok()?;
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }

    async fn is_file(path: &Path) -> bool {
        fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
    }

    /// Whether the file at `path` is older than the selected threshold.
    ///
    /// A timestamp in the future counts as stale.
    async fn is_stale(&self, path: &Path, stable: bool) -> bool {
        let Some(threshold) = self.staleness.threshold(stable) else {
            return false;
        };

        let modified = match fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read cache entry timestamp");
                return true;
            }
        };

        match SystemTime::now().duration_since(modified) {
            Ok(age) => age > threshold,
            Err(skew) => {
                tracing::error!(
                    path = %path.display(),
                    ahead_by = ?skew.duration(),
                    "cache entry timestamp is in the future, treating as stale"
                );
                true
            }
        }
    }

    async fn delete(path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "cannot delete cache entry");
                false
            }
        }
    }

    /// Walk the cache tree deleting entries, then prune directories left empty.
    ///
    /// Stale means stale under the stable threshold. Stops after `limit`
    /// deletions when a limit is given.
    async fn clean_tree(&self, only_old: bool, limit: Option<usize>) -> usize {
        let mut removed = 0;
        let mut visited = Vec::new();
        let mut pending = vec![self.root.clone()];

        'walk: while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "cannot list cache directory");
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(path = %dir.display(), error = %e, "cannot list cache directory");
                        break;
                    }
                };

                let path = entry.path();
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                if is_dir {
                    visited.push(path.clone());
                    pending.push(path);
                    continue;
                }

                if limit.is_some_and(|limit| removed >= limit) {
                    break 'walk;
                }
                if (!only_old || self.is_stale(&path, true).await) && Self::delete(&path).await {
                    removed += 1;
                }
            }
        }

        // Children are always discovered after their parent.
        for dir in visited.iter().rev() {
            let empty = match fs::read_dir(dir).await {
                Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
                Err(_) => false,
            };
            if empty && let Err(e) = fs::remove_dir(dir).await {
                tracing::warn!(path = %dir.display(), error = %e, "cannot prune cache directory");
            }
        }

        if removed > 0 {
            tracing::debug!(removed, only_old, "cache cleaned");
        }
        removed
    }
}

#[async_trait]
impl ResourceCache for DiskCache {
    async fn check(&self, key: &CacheKey, allow_too_old: bool, stable: bool) -> bool {
        let path = self.path_for(key);
        if !Self::is_file(&path).await {
            return false;
        }
        if allow_too_old || !self.is_stale(&path, stable).await {
            return true;
        }

        tracing::trace!(%key, "evicting stale cache entry");
        Self::delete(&path).await;
        false
    }

    async fn load(&self, key: &CacheKey, allow_too_old: bool, stable: bool) -> Result<Option<Bytes>, Error> {
        let path = self.path_for(key);
        if !Self::is_file(&path).await {
            return Ok(None);
        }
        if !allow_too_old && self.is_stale(&path, stable).await {
            return Ok(None);
        }

        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &CacheKey, data: &[u8]) -> Result<u64, Error> {
        self.clean_tree(true, Some(SAVE_CLEANUP_LIMIT)).await;

        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Written aside and renamed in, so a failed write never leaves a short entry.
        let partial = partial_path(&path);
        let written = async {
            fs::write(&partial, data).await?;
            fs::rename(&partial, &path).await
        }
        .await;
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&partial).await
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %partial.display(), error = %cleanup, "cannot remove partial cache file");
            }
            return Err(e.into());
        }

        tracing::trace!(%key, bytes = data.len(), "saved to cache");
        Ok(data.len() as u64)
    }

    async fn remove(&self, key: &CacheKey) -> bool {
        let path = self.path_for(key);
        Self::is_file(&path).await && Self::delete(&path).await
    }

    async fn clean(&self, only_old: bool) -> usize {
        self.clean_tree(only_old, None).await
    }
}

/// Sibling of `path` that a save writes before renaming into place.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".partial");
    path.with_file_name(name)
}
