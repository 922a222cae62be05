//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Server lifecycle, connections, dispatch outcomes
//!     → Diagnostics (optional sink handle)
//!     → Logger implementation (TracingLogger by default)
//!     → tracing subscriber (stdout / test writer)
//! ```
//!
//! # Design Decisions
//! - A missing logger turns every diagnostic into a no-op
//! - Messages are rendered lazily so silent servers pay nothing

pub mod logging;

pub use logging::{init_logging, Diagnostics, Level, Logger, TracingLogger};
