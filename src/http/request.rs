//! Aggregated request values handed to stubs.
//!
//! # Responsibilities
//! - Hold one fully received request (head plus complete body)
//! - Case-insensitive header lookup, per-name values in arrival order
//! - Convenience accessors for matchers (path, query, JSON body)
//!
//! # Design Decisions
//! - Immutable after construction: no setters, fields are private
//! - Body is a single contiguous `Bytes` regardless of transport chunking

use std::fmt;

use bytes::Bytes;
use hyper::{Method, Version};
use serde::de::DeserializeOwned;
use url::Url;

/// Ordered header multi-map with ASCII-case-insensitive name lookup.
///
/// Iteration follows insertion order. Headers received from the wire go
/// through hyper's `HeaderMap` first, which lowercases names and groups
/// repeated names at their first occurrence: values of one name keep
/// their arrival order, but interleaving with other names is lost.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping any earlier values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert a hyper header map, grouped by name as the map yields them.
    /// Values that are not valid UTF-8 are decoded lossily.
    pub fn from_header_map(map: &hyper::HeaderMap) -> Self {
        let entries = map
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self { entries }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect(),
        }
    }
}

/// Absolute URL for a received request target: the base URL with its path
/// and query replaced. Scheme and authority always come from `base`.
pub fn resolve_url(base: &Url, uri: &str) -> Url {
    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    };
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(query);
    url.set_fragment(None);
    url
}

/// Request line and headers, as delivered before any body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub uri: String,
    pub headers: Headers,
    pub version: Version,
}

impl RequestHead {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Headers::new(),
            version: Version::HTTP_11,
        }
    }
}

/// One complete inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    uri: String,
    headers: Headers,
    body: Bytes,
    version: Version,
    url: Option<Url>,
}

impl Request {
    pub(crate) fn from_parts(head: RequestHead, body: Bytes, url: Option<Url>) -> Self {
        Self {
            method: head.method,
            uri: head.uri,
            headers: head.headers,
            body,
            version: head.version,
            url,
        }
    }

    /// Start building a request by hand, mostly for exercising stubs
    /// without a running server.
    pub fn builder(method: Method, uri: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            head: RequestHead::new(method, uri),
            body: Bytes::new(),
            url: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path plus optional query, exactly as received.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn path(&self) -> &str {
        match self.uri.split_once('?') {
            Some((path, _)) => path,
            None => &self.uri,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Absolute URL derived from the server base URL, when known.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}

/// Builder returned by [`Request::builder`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    head: RequestHead,
    body: Bytes,
    url: Option<Url>,
}

impl RequestBuilder {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.head.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.head.version = version;
        self
    }

    pub fn base_url(mut self, base: &Url) -> Self {
        self.url = Some(resolve_url(base, &self.head.uri));
        self
    }

    pub fn build(self) -> Request {
        Request::from_parts(self.head, self.body, self.url)
    }
}
