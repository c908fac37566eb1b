//! The network seam under the fetcher.
//!
//! A [`Transport`] sends exactly one HTTP exchange: it never follows
//! redirects, never decompresses and never touches cookies. Those policies
//! belong to the fetcher so they behave the same whatever carries the bytes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use url::Url;

use tome_core::Error;

/// One outgoing HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Raw response, body still in its transfer encoding.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error>;
}

/// reqwest-backed transport.
///
/// Built without reqwest's decompression features and with redirects
/// disabled.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::HttpError(format!("network error: {}", err)) }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let mut builder = self.http.request(request.method, request.url).headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse { status, headers, body })
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! Scripted transport recording every exchange.

    use super::*;
    use reqwest::header::{HeaderValue, LOCATION};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct StubTransport {
        routes: Mutex<HashMap<String, HttpResponse>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl StubTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn route(&self, url: &str, response: HttpResponse) {
            self.routes.lock().unwrap().insert(url.to_string(), response);
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    pub(crate) fn ok(body: &[u8]) -> HttpResponse {
        HttpResponse { status: StatusCode::OK, headers: HeaderMap::new(), body: Bytes::copy_from_slice(body) }
    }

    pub(crate) fn redirect(status: u16, location: &str) -> HttpResponse {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_str(location).unwrap());
        HttpResponse { status: StatusCode::from_u16(status).unwrap(), headers, body: Bytes::new() }
    }

    pub(crate) fn status(status: u16) -> HttpResponse {
        HttpResponse { status: StatusCode::from_u16(status).unwrap(), headers: HeaderMap::new(), body: Bytes::new() }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
            let url = request.url.to_string();
            self.requests.lock().unwrap().push(request);
            let response = self.routes.lock().unwrap().get(&url).cloned();
            Ok(response.unwrap_or_else(|| status(404)))
        }
    }
}
