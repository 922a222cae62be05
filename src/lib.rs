//! Embeddable HTTP stub server for tests.
//!
//! A [`StubServer`] listens on a local port and answers each request from an
//! ordered list of [`Stub`]s: the first stub whose matcher accepts the
//! request and whose handler produces a response wins. Requests nobody
//! answers get a JSON 404.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::{Defaults, ServerConfig};
pub use http::{Request, Response, ResponseError, ServerError, StubServer};
pub use lifecycle::ServerState;
pub use routing::{validators, Stub};
