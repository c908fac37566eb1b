//! Description of one logical download.

use std::collections::BTreeMap;

use url::Url;

use super::url::canonicalize;
use tome_core::Error;

/// Encoded request body and whether it switches the method to POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FormBody {
    /// GET parameters, sent as the body of a GET request.
    Get(String),
    /// POST parameters, sent as a form submission.
    Post(String),
}

/// A download request.
///
/// `identity` addresses the cache; it defaults to `url` and is kept across
/// redirects. When both `get` and `post` are set, `get` wins.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub identity: Option<Url>,
    pub referer: Option<Url>,
    pub cookies: BTreeMap<String, String>,
    pub post: BTreeMap<String, String>,
    pub get: BTreeMap<String, String>,
    pub oauth: Option<String>,
    pub stable: bool,
}

impl Request {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            identity: None,
            referer: None,
            cookies: BTreeMap::new(),
            post: BTreeMap::new(),
            get: BTreeMap::new(),
            oauth: None,
            stable: false,
        }
    }

    /// Canonicalize `url` and build a request for it.
    pub fn parse(url: &str) -> Result<Self, Error> {
        Ok(Self::new(canonicalize(url)?))
    }

    pub fn identity(mut self, identity: Url) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn referer(mut self, referer: Url) -> Self {
        self.referer = Some(referer);
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn post(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.post.insert(name.into(), value.into());
        self
    }

    pub fn get(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.get.insert(name.into(), value.into());
        self
    }

    pub fn oauth(mut self, token: impl Into<String>) -> Self {
        self.oauth = Some(token.into());
        self
    }

    pub fn stable(mut self, stable: bool) -> Self {
        self.stable = stable;
        self
    }

    /// URL used to address the cache.
    pub fn identity_url(&self) -> &Url {
        self.identity.as_ref().unwrap_or(&self.url)
    }

    pub(crate) fn form_body(&self) -> Option<FormBody> {
        if !self.get.is_empty() {
            Some(FormBody::Get(encode(&self.get)))
        } else if !self.post.is_empty() {
            Some(FormBody::Post(encode(&self.post)))
        } else {
            None
        }
    }
}

fn encode(params: &BTreeMap<String, String>) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonicalizes() {
        let request = Request::parse(" EXAMPLE.com/s/1#top ").unwrap();
        assert_eq!(request.url.as_str(), "https://example.com/s/1");
        assert!(!request.stable);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(Request::parse(""), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_identity_defaults_to_url() {
        let request = Request::parse("https://example.com/a").unwrap();
        assert_eq!(request.identity_url().as_str(), "https://example.com/a");

        let identity = Url::parse("https://example.com/canonical").unwrap();
        let request = request.identity(identity.clone());
        assert_eq!(request.identity_url(), &identity);
    }

    #[test]
    fn test_form_body_none() {
        let request = Request::parse("https://example.com/").unwrap();
        assert_eq!(request.form_body(), None);
    }

    #[test]
    fn test_form_body_post_encoding() {
        let request = Request::parse("https://example.com/login")
            .unwrap()
            .post("user", "ann lee")
            .post("pass", "a&b=c");
        assert_eq!(request.form_body(), Some(FormBody::Post("pass=a%26b%3Dc&user=ann+lee".into())));
    }

    #[test]
    fn test_form_body_get_wins() {
        let request = Request::parse("https://example.com/search")
            .unwrap()
            .post("ignored", "1")
            .get("q", "dragons");
        assert_eq!(request.form_body(), Some(FormBody::Get("q=dragons".into())));
    }
}
