//! Stub dispatch.
//!
//! # Responsibilities
//! - Evaluate the effective stub list (instance stubs, then defaults) in order
//! - Record the winning response in the stub's history
//! - Run the unhandled path when nothing responds
//! - Serialize the outcome into a response frame
//!
//! # Design Decisions
//! - First match wins; later handlers never run for a resolved request
//! - A decline passes control to the next stub
//! - The unhandled callback runs before any byte is written
//! - Runs to completion without suspension points

use std::fmt;
use std::sync::Arc;

use hyper::StatusCode;

use crate::http::{Request, Response, ResponseError, ResponseFrame};
use crate::observability::Diagnostics;
use crate::routing::stub::{Evaluation, Stub};

/// Invoked once for every request no stub resolved.
pub type UnhandledCallback = Arc<dyn Fn(&Request) + Send + Sync>;

/// Default unhandled callback: logs the request at warn level.
pub fn log_unhandled() -> UnhandledCallback {
    Arc::new(|req: &Request| tracing::warn!(request = %req, "Unhandled request"))
}

/// Outcome of dispatching one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Stub at `index` in the effective list produced `response`.
    Matched { index: usize, response: Response },
    /// No stub responded; `response` is the synthesized 404.
    Unhandled { response: Response },
}

impl Dispatch {
    pub fn response(&self) -> &Response {
        match self {
            Dispatch::Matched { response, .. } | Dispatch::Unhandled { response } => response,
        }
    }

    pub fn is_unhandled(&self) -> bool {
        matches!(self, Dispatch::Unhandled { .. })
    }
}

/// Resolves requests against an ordered stub list.
#[derive(Clone)]
pub struct Dispatcher {
    stubs: Vec<Arc<Stub>>,
    instance_count: usize,
    unhandled: UnhandledCallback,
    diagnostics: Diagnostics,
}

impl Dispatcher {
    /// Effective list is `stubs` followed by `defaults`.
    pub fn new(
        stubs: Vec<Arc<Stub>>,
        defaults: &[Arc<Stub>],
        unhandled: UnhandledCallback,
        diagnostics: Diagnostics,
    ) -> Self {
        let instance_count = stubs.len();
        let mut effective = stubs;
        effective.extend(defaults.iter().cloned());
        Self {
            stubs: effective,
            instance_count,
            unhandled,
            diagnostics,
        }
    }

    pub fn stubs(&self) -> &[Arc<Stub>] {
        &self.stubs
    }

    pub fn dispatch(&self, req: &Request) -> Dispatch {
        for (index, stub) in self.stubs.iter().enumerate() {
            match stub.evaluate(req) {
                Evaluation::NoMatch => continue,
                Evaluation::Declined => {
                    self.diagnostics
                        .debug(|| format!("{} declined {req}", self.label(index)));
                }
                Evaluation::Respond(response) => {
                    self.diagnostics.info(|| {
                        format!(
                            "Handling {req} with {} -> {}",
                            self.label(index),
                            response.status()
                        )
                    });
                    stub.record(response.clone());
                    return Dispatch::Matched { index, response };
                }
            }
        }

        (self.unhandled)(req);
        self.diagnostics
            .warning(|| format!("Unsupported handling of {req}"));
        Dispatch::Unhandled {
            response: Response::error(StatusCode::NOT_FOUND, ResponseError::not_found(req)),
        }
    }

    /// Dispatch and serialize, echoing the request's protocol version.
    pub fn respond(&self, req: &Request) -> ResponseFrame {
        let outcome = self.dispatch(req);
        ResponseFrame::from_response(outcome.response(), req.version())
    }

    fn label(&self, index: usize) -> String {
        let origin = if index < self.instance_count {
            "stub"
        } else {
            "default stub"
        };
        match self.stubs.get(index).and_then(|s| s.name()) {
            Some(name) => format!("{origin} '{name}'"),
            None => format!("{origin} #{index}"),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("stubs", &self.stubs.len())
            .field("instance_stubs", &self.instance_count)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}
