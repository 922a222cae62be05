//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Aggregated Request
//!     → dispatcher.rs (walk instance stubs, then default stubs)
//!     → stub.rs (matcher → handler: no-match / decline / respond)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: matched Response (recorded in history) or unhandled 404
//! ```
//!
//! # Design Decisions
//! - Stub order is configuration; it is never re-sorted
//! - First responding stub wins
//! - Deterministic: same list and input always resolve the same way

pub mod dispatcher;
pub mod matcher;
pub mod stub;
pub mod validators;

pub use dispatcher::{log_unhandled, Dispatch, Dispatcher, UnhandledCallback};
pub use matcher::{
    route, AndMatcher, AnyMatcher, FnMatcher, HeaderMatcher, HeaderPresentMatcher, Matcher,
    MethodMatcher, PathMatcher, PathPrefixMatcher, UriMatcher,
};
pub use stub::{Evaluation, Rule, Stub};
