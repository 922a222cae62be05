//! Request predicates used by stubs.
//!
//! # Responsibilities
//! - Match method, exact uri, path, path prefix and headers
//! - Combine conditions with AND semantics
//! - Wrap arbitrary closures as matchers
//!
//! # Design Decisions
//! - Header names are matched case-insensitively (RFC 9110)
//! - Paths and header values are matched case-sensitively
//! - Matchers are pure: no side effects, callable any number of times

use std::fmt;

use hyper::Method;

use crate::http::Request;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request) -> bool;
}

/// Matches every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyMatcher;

impl Matcher for AnyMatcher {
    fn matches(&self, _req: &Request) -> bool {
        true
    }
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &Request) -> bool {
        *req.method() == self.method
    }
}

/// Matches the full path and query exactly as received.
#[derive(Debug, Clone)]
pub struct UriMatcher {
    uri: String,
}

impl UriMatcher {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

impl Matcher for UriMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.uri() == self.uri
    }
}

/// Matches the path, ignoring any query string.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    path: String,
}

impl PathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.path() == self.path
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.path().starts_with(&self.prefix)
    }
}

/// Matches when any value of the named header equals `value`.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: String,
    value: String,
}

impl HeaderMatcher {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.headers().get_all(&self.name).any(|v| v == self.value)
    }
}

/// Matches when the named header is present with any value.
#[derive(Debug, Clone)]
pub struct HeaderPresentMatcher {
    name: String,
}

impl HeaderPresentMatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Matcher for HeaderPresentMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.headers().contains(&self.name)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

/// Wraps a closure as a matcher.
pub struct FnMatcher<F> {
    predicate: F,
}

impl<F> FnMatcher<F>
where
    F: Fn(&Request) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> fmt::Debug for FnMatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMatcher")
    }
}

impl<F> Matcher for FnMatcher<F>
where
    F: Fn(&Request) -> bool + Send + Sync,
{
    fn matches(&self, req: &Request) -> bool {
        (self.predicate)(req)
    }
}

/// Shorthand for `METHOD uri` stubs.
pub fn route(method: Method, uri: impl Into<String>) -> AndMatcher {
    AndMatcher::new(vec![
        Box::new(MethodMatcher::new(method)),
        Box::new(UriMatcher::new(uri)),
    ])
}
