//! Structured logging.
//!
//! # Responsibilities
//! - Define the diagnostic sink servers report to
//! - Forward sink messages to `tracing` by default
//! - Install a subscriber for binaries and test harnesses
//!
//! # Design Decisions
//! - The sink is optional; a server without one behaves identically
//! - Messages are free text tagged with a severity

use std::fmt;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Severity attached to a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        f.write_str(name)
    }
}

/// A sink for diagnostic messages emitted by servers and dispatchers.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Default sink: forwards every message to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Debug => tracing::debug!(target: "stub_server", "{}", message),
            Level::Info => tracing::info!(target: "stub_server", "{}", message),
            Level::Warning => tracing::warn!(target: "stub_server", "{}", message),
            Level::Error => tracing::error!(target: "stub_server", "{}", message),
        }
    }
}

/// Optional logger handle carried by servers and dispatchers.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Arc<dyn Logger>>,
}

impl Diagnostics {
    pub fn new(sink: Option<Arc<dyn Logger>>) -> Self {
        Self { sink }
    }

    /// A handle that drops every message.
    pub fn silent() -> Self {
        Self { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn log(&self, level: Level, message: impl FnOnce() -> String) {
        if let Some(sink) = &self.sink {
            sink.log(level, &message());
        }
    }

    pub fn debug(&self, message: impl FnOnce() -> String) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl FnOnce() -> String) {
        self.log(Level::Info, message);
    }

    pub fn warning(&self, message: impl FnOnce() -> String) {
        self.log(Level::Warning, message);
    }

    pub fn error(&self, message: impl FnOnce() -> String) {
        self.log(Level::Error, message);
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Install a global `tracing` subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stub_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(Level, String)>>);

    impl Logger for Capture {
        fn log(&self, level: Level, message: &str) {
            self.0.lock().unwrap().push((level, message.to_string()));
        }
    }

    #[test]
    fn silent_diagnostics_never_builds_message() {
        let diagnostics = Diagnostics::silent();
        diagnostics.info(|| panic!("message must not be rendered"));
        assert!(!diagnostics.is_enabled());
    }

    #[test]
    fn diagnostics_forwards_level_and_message() {
        let capture = Arc::new(Capture::default());
        let diagnostics = Diagnostics::new(Some(capture.clone()));

        diagnostics.warning(|| "no stub".to_string());
        diagnostics.debug(|| "accepted".to_string());

        let seen = capture.0.lock().unwrap();
        assert_eq!(seen[0], (Level::Warning, "no stub".to_string()));
        assert_eq!(seen[1], (Level::Debug, "accepted".to_string()));
    }

    #[test]
    fn level_display() {
        assert_eq!(Level::Warning.to_string(), "warning");
        assert_eq!(Level::Error.to_string(), "error");
    }
}
