//! In-memory resource cache.
//!
//! Same contract as the disk cache but nothing is persisted and nothing ever
//! goes stale: `allow_too_old` and `stable` are ignored.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{CacheKey, ResourceCache};
use crate::Error;

/// Process-local cache keyed by the normalized key string.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn normalize(key: &CacheKey) -> String {
        key.relative_path().to_string_lossy().into_owned()
    }
}

#[async_trait]
impl ResourceCache for MemoryCache {
    async fn check(&self, key: &CacheKey, _allow_too_old: bool, _stable: bool) -> bool {
        self.entries.read().await.contains_key(&Self::normalize(key))
    }

    async fn load(&self, key: &CacheKey, _allow_too_old: bool, _stable: bool) -> Result<Option<Bytes>, Error> {
        Ok(self.entries.read().await.get(&Self::normalize(key)).cloned())
    }

    async fn save(&self, key: &CacheKey, data: &[u8]) -> Result<u64, Error> {
        let mut entries = self.entries.write().await;
        entries.insert(Self::normalize(key), Bytes::copy_from_slice(data));
        Ok(data.len() as u64)
    }

    async fn remove(&self, key: &CacheKey) -> bool {
        self.entries.write().await.remove(&Self::normalize(key)).is_some()
    }

    async fn clean(&self, only_old: bool) -> usize {
        if only_old {
            return 0;
        }
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }
}
