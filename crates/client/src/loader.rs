//! Resource loader: one entry point over a cached and a direct fetcher.
//!
//! The cached fetcher always consults the persistent cache. The direct
//! fetcher bypasses it while online; while offline the cache is attached to
//! it as a read fallback so previously downloaded data stays reachable.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use crate::fetch::{CookieJar, Fetcher, Request, ReqwestTransport, Transport};
use tome_core::{AppConfig, CacheKey, DiskCache, Error, MemoryCache, ResourceCache};

/// Per-site request state supplied by the caller (session cookies, current
/// referer, OAuth value).
pub trait RequestContext: Send + Sync {
    fn cookies(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn referer(&self) -> Option<Url> {
        None
    }

    fn oauth(&self) -> Option<String> {
        None
    }
}

pub struct ResourceLoader {
    cache: Arc<dyn ResourceCache>,
    cached: Fetcher,
    direct: Fetcher,
}

impl ResourceLoader {
    /// Build a loader over `cache`, sharing one cookie jar between both
    /// fetchers.
    pub fn new(
        cache: Arc<dyn ResourceCache>, transport: Arc<dyn Transport>, user_agent: &str, max_redirects: usize,
    ) -> Self {
        let cookies = CookieJar::new();
        let cached = Fetcher::new(transport.clone(), user_agent)
            .with_cache(cache.clone())
            .with_cookies(cookies.clone())
            .with_max_redirects(max_redirects);
        let direct = Fetcher::new(transport, user_agent)
            .with_cookies(cookies)
            .with_max_redirects(max_redirects);

        Self { cache, cached, direct }
    }

    /// Build a loader from configuration.
    ///
    /// Falls back to a memory cache when the disk cache cannot be opened.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let transport = Arc::new(ReqwestTransport::new(config.timeout())?);

        let cache: Arc<dyn ResourceCache> = match DiskCache::new(&config.cache_dir, config.staleness()) {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                tracing::error!(error = %e, "cannot open disk cache, using a memory cache");
                Arc::new(MemoryCache::new())
            }
        };

        let loader = Self::new(cache, transport, &config.user_agent, config.max_redirects);
        if config.offline {
            loader.set_offline(true).await;
        }
        Ok(loader)
    }

    pub fn cache(&self) -> &Arc<dyn ResourceCache> {
        &self.cache
    }

    pub fn cookies(&self) -> &CookieJar {
        self.cached.cookies()
    }

    pub fn is_offline(&self) -> bool {
        self.cached.is_offline()
    }

    /// Enable or disable network access for both fetchers.
    pub async fn set_offline(&self, offline: bool) {
        self.cached.set_offline(offline);
        self.direct.set_offline(offline);
        let fallback = if offline { Some(self.cache.clone()) } else { None };
        self.direct.set_cache(fallback).await;
        tracing::info!(offline, "network mode changed");
    }

    /// Open a resource through the cache.
    pub async fn open(&self, request: Request, context: Option<&dyn RequestContext>) -> Result<Bytes, Error> {
        self.cached.open(&resolve(request, context)).await
    }

    /// Open a resource bypassing the cache (unless offline).
    pub async fn open_no_cache(&self, request: Request, context: Option<&dyn RequestContext>) -> Result<Bytes, Error> {
        self.direct.open(&resolve(request, context)).await
    }

    /// Download `url` into the cache unless a fresh copy is already there.
    pub async fn refresh(&self, url: &Url, context: Option<&dyn RequestContext>, stable: bool) -> Result<(), Error> {
        if !self.check(url, stable).await {
            self.open(Request::new(url.clone()).stable(stable), context).await?;
        }
        Ok(())
    }

    /// Whether the cache holds a fresh copy of `url`.
    pub async fn check(&self, url: &Url, stable: bool) -> bool {
        self.cache.check(&CacheKey::from(url), false, stable).await
    }

    /// Store bytes under an opaque id, outside any URL fetch.
    pub async fn add_to_cache(&self, data: &[u8], id: &str) -> Result<u64, Error> {
        self.cache.save(&CacheKey::Id(id.to_string()), data).await
    }

    /// Bytes stored under `id`, regardless of age.
    pub async fn get_from_cache(&self, id: &str) -> Result<Option<Bytes>, Error> {
        self.cache.load(&CacheKey::Id(id.to_string()), true, true).await
    }

    pub async fn remove_from_cache(&self, id: &str) -> bool {
        self.cache.remove(&CacheKey::Id(id.to_string())).await
    }

    pub async fn clean_cache(&self, only_old: bool) -> usize {
        self.cache.clean(only_old).await
    }
}

/// Fill referer, cookies and OAuth from the context where the request has none.
fn resolve(mut request: Request, context: Option<&dyn RequestContext>) -> Request {
    let Some(context) = context else {
        return request;
    };

    for (name, value) in context.cookies() {
        request.cookies.entry(name).or_insert(value);
    }
    if request.referer.is_none() {
        request.referer = context.referer();
    }
    if request.oauth.is_none() {
        request.oauth = context.oauth();
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::transport::stub::{StubTransport, ok};
    use reqwest::header;

    struct SiteContext;

    impl RequestContext for SiteContext {
        fn cookies(&self) -> BTreeMap<String, String> {
            BTreeMap::from([("view_adult".to_string(), "true".to_string())])
        }

        fn referer(&self) -> Option<Url> {
            Url::parse("https://example.com/works").ok()
        }

        fn oauth(&self) -> Option<String> {
            Some("Bearer from-context".into())
        }
    }

    fn loader(stub: &Arc<StubTransport>) -> ResourceLoader {
        ResourceLoader::new(Arc::new(MemoryCache::new()), stub.clone(), "tome-test/1.0", 10)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_open_populates_cache() {
        let stub = Arc::new(StubTransport::new());
        stub.route("https://example.com/s/1", ok(b"story"));
        let loader = loader(&stub);

        assert!(!loader.check(&url("https://example.com/s/1"), false).await);
        let bytes = loader.open(Request::new(url("https://example.com/s/1")), None).await.unwrap();
        assert_eq!(&bytes[..], b"story");
        assert!(loader.check(&url("https://example.com/s/1"), false).await);

        loader.open(Request::new(url("https://example.com/s/1")), None).await.unwrap();
        assert_eq!(stub.request_count(), 1);
    }

    #[tokio::test]
    async fn test_open_no_cache_bypasses_cache_online() {
        let stub = Arc::new(StubTransport::new());
        stub.route("https://example.com/s/1", ok(b"live"));
        let loader = loader(&stub);

        loader.open_no_cache(Request::new(url("https://example.com/s/1")), None).await.unwrap();
        loader.open_no_cache(Request::new(url("https://example.com/s/1")), None).await.unwrap();
        assert_eq!(stub.request_count(), 2);
        assert!(!loader.check(&url("https://example.com/s/1"), false).await);
    }

    #[tokio::test]
    async fn test_offline_with_empty_cache_fails_without_network() {
        let stub = Arc::new(StubTransport::new());
        stub.route("https://example.com/s/1", ok(b"live"));
        let loader = loader(&stub);
        loader.set_offline(true).await;
        assert!(loader.is_offline());

        let result = loader.open(Request::new(url("https://example.com/s/1")), None).await;
        assert!(matches!(result, Err(Error::Offline(_))));
        let result = loader.open_no_cache(Request::new(url("https://example.com/s/1")), None).await;
        assert!(matches!(result, Err(Error::Offline(_))));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_fallback_for_direct_requests() {
        let stub = Arc::new(StubTransport::new());
        stub.route("https://example.com/s/1", ok(b"v1"));
        let loader = loader(&stub);

        loader.open(Request::new(url("https://example.com/s/1")), None).await.unwrap();
        loader.set_offline(true).await;
        let bytes = loader.open_no_cache(Request::new(url("https://example.com/s/1")), None).await.unwrap();
        assert_eq!(&bytes[..], b"v1");
        assert_eq!(stub.request_count(), 1);

        stub.route("https://example.com/s/1", ok(b"v2"));
        loader.set_offline(false).await;
        let bytes = loader.open_no_cache(Request::new(url("https://example.com/s/1")), None).await.unwrap();
        assert_eq!(&bytes[..], b"v2");
        assert_eq!(stub.request_count(), 2);
    }

    #[tokio::test]
    async fn test_context_resolution() {
        let stub = Arc::new(StubTransport::new());
        stub.route("https://example.com/s/2", ok(b"x"));
        let loader = loader(&stub);

        let request = Request::new(url("https://example.com/s/2")).cookie("view_adult", "false");
        loader.open_no_cache(request, Some(&SiteContext)).await.unwrap();

        let sent = &stub.requests()[0];
        assert_eq!(sent.headers[header::AUTHORIZATION], "Bearer from-context");
        assert_eq!(sent.headers[header::REFERER], "https://example.com/works");
        assert_eq!(sent.headers[header::COOKIE], "view_adult=false");
    }

    #[tokio::test]
    async fn test_explicit_oauth_beats_context() {
        let stub = Arc::new(StubTransport::new());
        stub.route("https://example.com/s/3", ok(b"x"));
        let loader = loader(&stub);

        let request = Request::new(url("https://example.com/s/3")).oauth("Bearer explicit");
        loader.open(request, Some(&SiteContext)).await.unwrap();

        let sent = &stub.requests()[0];
        assert_eq!(sent.headers[header::AUTHORIZATION], "Bearer explicit");
        assert_eq!(sent.headers[header::COOKIE], "view_adult=true");
    }

    #[tokio::test]
    async fn test_refresh_only_when_missing() {
        let stub = Arc::new(StubTransport::new());
        stub.route("https://example.com/s/4", ok(b"warm"));
        let loader = loader(&stub);

        loader.refresh(&url("https://example.com/s/4"), None, true).await.unwrap();
        assert!(loader.check(&url("https://example.com/s/4"), true).await);
        loader.refresh(&url("https://example.com/s/4"), None, true).await.unwrap();
        assert_eq!(stub.request_count(), 1);
    }

    #[tokio::test]
    async fn test_manual_cache_entries() {
        let stub = Arc::new(StubTransport::new());
        let loader = loader(&stub);

        assert_eq!(loader.add_to_cache(b"hello", "story-123").await.unwrap(), 5);
        let bytes = loader.get_from_cache("story-123").await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"hello"[..]));

        assert!(loader.remove_from_cache("story-123").await);
        assert!(loader.get_from_cache("story-123").await.unwrap().is_none());
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn test_clean_cache() {
        let stub = Arc::new(StubTransport::new());
        let loader = loader(&stub);
        loader.add_to_cache(b"a", "thumbs/1").await.unwrap();
        loader.add_to_cache(b"b", "thumbs/2").await.unwrap();

        assert_eq!(loader.clean_cache(true).await, 0);
        assert_eq!(loader.clean_cache(false).await, 2);
        assert!(loader.get_from_cache("thumbs/1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_backed_loader() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(DiskCache::new(temp_dir.path(), tome_core::Staleness::from_hours(1, 24)).unwrap());
        let stub = Arc::new(StubTransport::new());
        stub.route("https://example.com/s/5", ok(b"on disk"));
        let loader = ResourceLoader::new(cache.clone(), stub.clone(), "tome-test/1.0", 10);

        loader.open(Request::new(url("https://example.com/s/5")), None).await.unwrap();
        assert!(cache.path_for(&CacheKey::Url(url("https://example.com/s/5"))).is_file());
        loader.add_to_cache(b"thumb", "covers/5").await.unwrap();
        assert!(temp_dir.path().join("covers/_/5").is_file());
    }

    #[tokio::test]
    async fn test_refresh_local_file_warms_disk_cache() {
        let cache_dir = tempfile::tempdir().unwrap();
        let source_dir = tempfile::tempdir().unwrap();
        let path = source_dir.path().join("story.html");
        std::fs::write(&path, b"<html>local</html>").unwrap();
        let file_url = Url::from_file_path(&path).unwrap();

        let cache = Arc::new(DiskCache::new(cache_dir.path(), tome_core::Staleness::from_hours(1, 24)).unwrap());
        let stub = Arc::new(StubTransport::new());
        let loader = ResourceLoader::new(cache.clone(), stub.clone(), "tome-test/1.0", 10);

        assert!(!loader.check(&file_url, false).await);
        loader.refresh(&file_url, None, false).await.unwrap();
        assert!(loader.check(&file_url, false).await);
        assert!(cache.path_for(&CacheKey::Url(file_url)).is_file());
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn test_from_config_falls_back_to_memory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let config = AppConfig { cache_dir: blocker, offline: true, ..Default::default() };

        let loader = ResourceLoader::from_config(&config).await.unwrap();
        assert!(loader.is_offline());
        loader.add_to_cache(b"kept", "id").await.unwrap();
        assert_eq!(loader.get_from_cache("id").await.unwrap().as_deref(), Some(&b"kept"[..]));
    }
}
