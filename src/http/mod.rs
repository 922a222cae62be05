//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1, keep-alive off, one exchange)
//!     → aggregator.rs (head + body chunks + end → Request)
//!     → [routing layer picks a stub]
//!     → response.rs (Response → status line, headers, body)
//!     → Send to client, close
//! ```

pub mod aggregator;
pub mod request;
pub mod response;
pub mod server;

pub use aggregator::{aggregate, AggregateError, MessagePart, RequestAggregator};
pub use request::{Headers, Request, RequestBuilder, RequestHead};
pub use response::{
    Response, ResponseError, ResponseFrame, DEFAULT_CONTENT_TYPE, ERROR_CONTENT_TYPE,
};
pub use server::{random_port, ServerError, StubServer, StubServerBuilder};
