//! HTTP fetch pipeline with an optional resource cache.
//!
//! ### Request
//! - `User-Agent` fixed at construction, `Accept-Encoding: gzip`
//! - `Cookie` built from the session jar overlaid with per-request cookies
//! - `Referer` and `Host` when a referer is given
//! - GET parameters win over POST parameters; only POST parameters switch
//!   the method and add the form `Content-Type`
//! - `Authorization` carries the OAuth value verbatim
//!
//! ### Response
//! - 3xx: follow `Location` (relative values resolved), bounded hop count
//! - gzip `Content-Encoding`: body decompressed before caching/returning
//! - `Set-Cookie`: recorded in the session jar on every hop
//!
//! ### Cache and offline
//! - Cache lookups and saves are addressed by the request's identity URL
//! - Offline fetchers never reach the transport; a miss is an error
//! - `file://` URLs are read from disk instead of the transport, cached like
//!   downloads, and work offline

pub mod cookies;
pub mod request;
pub mod transport;
pub mod url;

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use flate2::read::GzDecoder;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use tokio::sync::RwLock;

pub use self::url::{UrlError, canonicalize};
pub use cookies::CookieJar;
pub use request::Request;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

use request::FormBody;
use tome_core::{CacheKey, Error, ResourceCache};

/// Default bound on redirects followed for one request.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Executes logical requests, following redirects and consulting a cache.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    cache: RwLock<Option<Arc<dyn ResourceCache>>>,
    cookies: CookieJar,
    user_agent: String,
    max_redirects: usize,
    offline: AtomicBool,
}

impl Fetcher {
    /// Create an online fetcher without cache and with a fresh cookie jar.
    pub fn new(transport: Arc<dyn Transport>, user_agent: impl Into<String>) -> Self {
        Self {
            transport,
            cache: RwLock::new(None),
            cookies: CookieJar::new(),
            user_agent: user_agent.into(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_cache(self, cache: Arc<dyn ResourceCache>) -> Self {
        Self { cache: RwLock::new(Some(cache)), ..self }
    }

    pub fn with_cookies(self, cookies: CookieJar) -> Self {
        Self { cookies, ..self }
    }

    pub fn with_max_redirects(self, max_redirects: usize) -> Self {
        Self { max_redirects, ..self }
    }

    /// Attach or detach the cache consulted by later requests.
    pub async fn set_cache(&self, cache: Option<Arc<dyn ResourceCache>>) {
        *self.cache.write().await = cache;
    }

    pub async fn cache(&self) -> Option<Arc<dyn ResourceCache>> {
        self.cache.read().await.clone()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Forget every cookie collected from earlier responses.
    pub async fn clear_cookies(&self) {
        self.cookies.clear().await;
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Fetch the resource described by `request`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, error statuses, broken redirects, gzip
    /// decoding errors, and when offline without cached data. Cache save
    /// failures are logged and do not fail the fetch.
    pub async fn open(&self, request: &Request) -> Result<Bytes, Error> {
        tracing::trace!(url = %request.url, "request");

        // Local files are the fetch source themselves, so offline never blocks them.
        let local = request.url.scheme() == "file";
        let cache = self.cache().await;
        let key = CacheKey::from(request.identity_url());

        if self.is_offline() && cache.is_none() && !local {
            tracing::error!(url = %request.url, "offline with no cache");
            return Err(Error::Offline(format!("no cache available for {}", request.url)));
        }

        if let Some(cache) = &cache {
            match cache.load(&key, false, request.stable).await {
                Ok(Some(bytes)) => {
                    tracing::trace!(url = %request.url, %key, "cache hit");
                    return Ok(bytes);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(%key, error = %e, "cache read failed, treating as miss"),
            }
        }

        let bytes = if local {
            read_local(&request.url).await?
        } else {
            if self.is_offline() {
                tracing::error!(url = %request.url, "offline, cannot download");
                return Err(Error::Offline(format!("cannot download {}", request.url)));
            }
            self.download(request).await?
        };

        if let Some(cache) = &cache {
            tracing::trace!(%key, "save to cache");
            if let Err(e) = cache.save(&key, &bytes).await {
                tracing::error!(%key, error = %e, "cannot save to cache");
            }
        }

        Ok(bytes)
    }

    /// Network part of [`open`](Self::open): redirect loop plus decoding.
    async fn download(&self, request: &Request) -> Result<Bytes, Error> {
        let mut url = request.url.clone();
        let mut hops = 0;

        loop {
            tracing::debug!(%url, hop = hops, "download");
            let response = self.transport.execute(self.build(request, &url).await?).await?;
            self.cookies.store_from(&response.headers).await;

            if response.status.is_redirection() {
                if hops >= self.max_redirects {
                    return Err(Error::TooManyRedirects { url: request.url.to_string(), max: self.max_redirects });
                }
                url = redirect_target(&url, response.status, &response.headers)?;
                hops += 1;
                continue;
            }

            if !response.status.is_success() {
                return Err(Error::HttpStatus { status: response.status.as_u16(), url: url.to_string() });
            }

            tracing::debug!(url = %request.url, final_url = %url, bytes = response.body.len(), "downloaded");
            return decode_body(&response);
        }
    }

    /// Build the exchange for one hop of `request`, currently aimed at `url`.
    async fn build(&self, request: &Request, url: &::url::Url) -> Result<HttpRequest, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, header_value(&self.user_agent)?);
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        if let Some(cookies) = self.cookies.header_value(&request.cookies).await {
            headers.insert(header::COOKIE, header_value(&cookies)?);
        }

        if let Some(referer) = &request.referer {
            headers.insert(header::REFERER, header_value(referer.as_str())?);
            if let Some(host) = url.host_str() {
                let host = match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                };
                headers.insert(header::HOST, header_value(&host)?);
            }
        }

        let mut method = Method::GET;
        let body = match request.form_body() {
            Some(FormBody::Get(body)) => Some(body.into_bytes()),
            Some(FormBody::Post(body)) => {
                method = Method::POST;
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
                headers.insert(HeaderName::from_static("charset"), HeaderValue::from_static("utf-8"));
                Some(body.into_bytes())
            }
            None => None,
        };

        if let Some(oauth) = &request.oauth {
            headers.insert(header::AUTHORIZATION, header_value(oauth)?);
        }

        Ok(HttpRequest { method, url: url.clone(), headers, body })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|e| Error::HttpError(format!("invalid header value: {e}")))
}

fn redirect_target(current: &::url::Url, status: StatusCode, headers: &HeaderMap) -> Result<::url::Url, Error> {
    let location = headers
        .get(header::LOCATION)
        .ok_or_else(|| Error::InvalidRedirect(format!("{status} from {current} without Location")))?;
    let location = location
        .to_str()
        .map_err(|_| Error::InvalidRedirect(format!("{status} from {current} with non-ASCII Location")))?;
    current
        .join(location.trim())
        .map_err(|e| Error::InvalidRedirect(format!("{status} from {current} to {location:?}: {e}")))
}

fn decode_body(response: &HttpResponse) -> Result<Bytes, Error> {
    let gzip = response
        .headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));
    if !gzip {
        return Ok(response.body.clone());
    }

    let mut decoded = Vec::new();
    GzDecoder::new(&response.body[..])
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Decode(format!("gzip: {e}")))?;
    Ok(Bytes::from(decoded))
}

async fn read_local(url: &::url::Url) -> Result<Bytes, Error> {
    let path = url
        .to_file_path()
        .map_err(|_| Error::InvalidUrl(format!("not a local file: {url}")))?;
    let data = tokio::fs::read(&path).await?;
    Ok(Bytes::from(data))
}
