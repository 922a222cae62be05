//! Stubs: a request predicate paired with a response handler.
//!
//! # Responsibilities
//! - Evaluate a request into no-match, decline or a response
//! - Record every response the stub actually produced
//! - Provide shorthand constructors for common fixed responses
//!
//! # Design Decisions
//! - "Matched but declined" is its own outcome, never folded into no-match
//! - History is append-only and guarded by a per-stub mutex
//! - Declines leave no trace in history

use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use hyper::StatusCode;
use serde::Serialize;

use crate::http::{Request, Response, ResponseError};
use crate::routing::matcher::{FnMatcher, Matcher, UriMatcher};

/// The capability a stub is built from.
pub trait Rule: Send + Sync {
    /// Pure predicate; may be called any number of times.
    fn matches(&self, req: &Request) -> bool;

    /// Produce a response, or `None` to let later stubs handle the request.
    fn handle(&self, req: &Request) -> Option<Response>;
}

/// Result of evaluating one stub against one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    NoMatch,
    Declined,
    Respond(Response),
}

struct MatchThen<M, H> {
    matcher: M,
    handler: H,
}

impl<M, H> Rule for MatchThen<M, H>
where
    M: Matcher,
    H: Fn(&Request) -> Option<Response> + Send + Sync,
{
    fn matches(&self, req: &Request) -> bool {
        self.matcher.matches(req)
    }

    fn handle(&self, req: &Request) -> Option<Response> {
        (self.handler)(req)
    }
}

/// A configured request/response rule with its call history.
pub struct Stub {
    name: Option<String>,
    rule: Box<dyn Rule>,
    history: Mutex<Vec<Response>>,
}

impl Stub {
    /// Build a stub from a matcher and a handler.
    ///
    /// Return `None` from the handler to decline a matched request.
    pub fn new<M, H>(matcher: M, handler: H) -> Self
    where
        M: Matcher + 'static,
        H: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
    {
        Self::from_rule(MatchThen { matcher, handler })
    }

    /// Build a stub from two closures.
    pub fn when<P, H>(predicate: P, handler: H) -> Self
    where
        P: Fn(&Request) -> bool + Send + Sync + 'static,
        H: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
    {
        Self::new(FnMatcher::new(predicate), handler)
    }

    pub fn from_rule(rule: impl Rule + 'static) -> Self {
        Self {
            name: None,
            rule: Box::new(rule),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Attach a label used in diagnostics.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn evaluate(&self, req: &Request) -> Evaluation {
        if !self.rule.matches(req) {
            return Evaluation::NoMatch;
        }
        match self.rule.handle(req) {
            Some(response) => Evaluation::Respond(response),
            None => Evaluation::Declined,
        }
    }

    pub(crate) fn record(&self, response: Response) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(response);
    }

    /// Responses emitted through this stub, in emission order.
    pub fn history(&self) -> Vec<Response> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn last_response(&self) -> Option<Response> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("name", &self.name)
            .field("calls", &self.call_count())
            .finish()
    }
}

// Shorthand constructors for fixed responses.
impl Stub {
    /// `200` with a fixed body.
    pub fn returning<M>(matcher: M, body: impl Into<Bytes>) -> Self
    where
        M: Matcher + 'static,
    {
        let body = body.into();
        Self::new(matcher, move |_| Some(Response::success(body.clone())))
    }

    /// `200 text/plain`.
    pub fn returning_text<M>(matcher: M, text: impl Into<String>) -> Self
    where
        M: Matcher + 'static,
    {
        let text = text.into();
        Self::new(matcher, move |_| Some(Response::text(text.clone())))
    }

    /// `200` with `value` encoded as JSON once, up front.
    pub fn returning_json<M, T>(matcher: M, value: &T) -> Self
    where
        M: Matcher + 'static,
        T: Serialize + ?Sized,
    {
        let response = Response::json(value);
        Self::new(matcher, move |_| Some(response.clone()))
    }

    /// `200` with the file contents, read on every call. A read error
    /// produces a synthesized `400` failure.
    pub fn returning_file<M>(matcher: M, path: impl Into<PathBuf>) -> Self
    where
        M: Matcher + 'static,
    {
        let path = path.into();
        Self::new(matcher, move |_| {
            Some(Response::catching(|| std::fs::read(&path).map(Bytes::from)))
        })
    }

    /// Failure with `status` and a random error payload generated per call.
    pub fn failing<M>(matcher: M, status: StatusCode) -> Self
    where
        M: Matcher + 'static,
    {
        Self::new(matcher, move |_| {
            Some(Response::error(status, ResponseError::random()))
        })
    }

    pub fn failing_with<M>(matcher: M, status: StatusCode, error: ResponseError) -> Self
    where
        M: Matcher + 'static,
    {
        Self::new(matcher, move |_| Some(Response::error(status, error.clone())))
    }

    /// Any method, exact uri, fixed text body.
    pub fn uri_text(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self::returning_text(UriMatcher::new(uri), text)
    }

    /// Any method, exact uri, JSON body.
    pub fn uri_json<T: Serialize + ?Sized>(uri: impl Into<String>, value: &T) -> Self {
        Self::returning_json(UriMatcher::new(uri), value)
    }
}
