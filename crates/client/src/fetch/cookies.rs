//! Session cookie jar.
//!
//! Cookies set by responses accumulate here and are sent with every later
//! request, regardless of domain. Cloned jars share the same storage, so one
//! jar can be injected into several fetchers.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::header::{HeaderMap, SET_COOKIE};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Arc<RwLock<BTreeMap<String, String>>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.write().await.insert(name.into(), value.into());
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        self.cookies.read().await.get(name).cloned()
    }

    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.cookies.read().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.cookies.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.cookies.write().await.clear();
    }

    /// Record every `Set-Cookie` header of a response.
    ///
    /// An empty value deletes the cookie.
    pub async fn store_from(&self, headers: &HeaderMap) {
        let mut parsed = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
            .peekable();
        if parsed.peek().is_none() {
            return;
        }

        let mut cookies = self.cookies.write().await;
        for (name, value) in parsed {
            tracing::trace!(cookie = %name, "cookie received");
            if value.is_empty() {
                cookies.remove(&name);
            } else {
                cookies.insert(name, value);
            }
        }
    }

    /// `Cookie` header value: jar contents overlaid with `overrides`.
    pub async fn header_value(&self, overrides: &BTreeMap<String, String>) -> Option<String> {
        let mut merged = self.snapshot().await;
        merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        if merged.is_empty() {
            return None;
        }

        let pairs: Vec<String> = merged.iter().map(|(name, value)| format!("{name}={value}")).collect();
        Some(pairs.join("; "))
    }
}

/// Name and value of a `Set-Cookie` header; attributes are ignored.
fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().trim_matches('"').to_string()))
}
