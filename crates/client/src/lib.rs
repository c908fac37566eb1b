//! Client code for tome.
//!
//! This crate provides the HTTP fetch pipeline (cookies, redirects, gzip,
//! offline mode) and the resource loader that pairs it with the cache.

pub mod fetch;
pub mod loader;

pub use fetch::{CookieJar, Fetcher, HttpRequest, HttpResponse, Request, ReqwestTransport, Transport};
pub use loader::{RequestContext, ResourceLoader};
