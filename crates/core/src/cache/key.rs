//! Deterministic, filesystem-safe cache addressing.
//!
//! Layout below the cache root:
//!
//! - host-bearing URL: `<host>/_<path>/_<query>`
//! - local file URL:   `<parent>/<file name>` (`..` segments become `__`)
//! - opaque id:        `<id parent>/_/<id name>`
//!
//! Every component is sanitized by replacing `/`, `:` and `\` with `_`.
//! Distinct inputs may collide after sanitization.

use std::fmt;
use std::path::PathBuf;

use url::Url;

/// Address of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A resource fetched from (or read through) a URL.
    Url(Url),
    /// An opaque identifier unrelated to any fetch (e.g. a thumbnail).
    Id(String),
}

impl CacheKey {
    /// Path of the entry relative to the cache root.
    pub fn relative_path(&self) -> PathBuf {
        match self {
            CacheKey::Url(url) => url_path(url),
            CacheKey::Id(id) => id_path(id),
        }
    }
}

impl From<Url> for CacheKey {
    fn from(url: Url) -> Self {
        CacheKey::Url(url)
    }
}

impl From<&Url> for CacheKey {
    fn from(url: &Url) -> Self {
        CacheKey::Url(url.clone())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Url(url) => write!(f, "{url}"),
            CacheKey::Id(id) => write!(f, "id:{id}"),
        }
    }
}

fn url_path(url: &Url) -> PathBuf {
    match url.host_str().filter(|h| !h.is_empty()) {
        Some(host) => {
            let host = match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            let mut path = PathBuf::from(sanitize(&host));
            path.push(sanitize(&format!("_{}", url.path())));
            path.push(sanitize(&format!("_{}", url.query().unwrap_or_default())));
            path
        }
        None => {
            let file = url.path();
            let (parent, name) = match file.rsplit_once('/') {
                Some((parent, name)) if !parent.is_empty() => (parent.replace("..", "__"), name),
                Some((_, name)) => ("+".to_string(), name),
                None => ("+".to_string(), file),
            };
            let mut path = PathBuf::from(sanitize(&parent));
            path.push(sanitize(name));
            path
        }
    }
}

fn id_path(id: &str) -> PathBuf {
    let (parent, name) = match id.rsplit_once('/') {
        Some((parent, name)) if !parent.is_empty() => (Some(parent), name),
        Some((_, name)) => (None, name),
        None => (None, id),
    };

    let mut path = PathBuf::new();
    if let Some(parent) = parent {
        path.push(sanitize(parent));
    }
    path.push("_");
    path.push(sanitize(name));
    path
}

/// Replace path separators and drive markers so a string is one path component.
pub fn sanitize(raw: &str) -> String {
    let cleaned = raw.replace(['/', ':', '\\'], "_");
    match cleaned.as_str() {
        "" => "_".to_string(),
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}
