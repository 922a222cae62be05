//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (state.rs):
//!     Idle → Starting → bind → Listening (or Stopped on bind failure)
//!
//! Stop (shutdown.rs):
//!     trigger → accept loop exits → drain in-flight exchanges → Stopped
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, release workers
//! - Drain has a timeout; stragglers are abandoned, not awaited forever
//! - No restart: Stopped is terminal

pub mod shutdown;
pub mod state;

pub use shutdown::Shutdown;
pub use state::{InvalidTransition, Lifecycle, ServerState};
