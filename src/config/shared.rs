//! Process-wide default configuration.
//!
//! Default stubs and the logger are shared by every server in the process.
//! Install them once during test or process setup, before the first server
//! is constructed; servers snapshot the current value at construction.

use std::fmt;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use crate::observability::{Diagnostics, Logger, TracingLogger};
use crate::routing::Stub;

static SHARED: OnceLock<ArcSwap<Defaults>> = OnceLock::new();

fn shared() -> &'static ArcSwap<Defaults> {
    SHARED.get_or_init(|| ArcSwap::from_pointee(Defaults::default()))
}

/// Fallback stubs evaluated after instance stubs, plus the diagnostic sink.
#[derive(Clone)]
pub struct Defaults {
    stubs: Vec<Arc<Stub>>,
    logger: Option<Arc<dyn Logger>>,
}

impl Defaults {
    /// No default stubs, no logger.
    pub fn empty() -> Self {
        Self {
            stubs: Vec::new(),
            logger: None,
        }
    }

    pub fn with_stub(mut self, stub: Arc<Stub>) -> Self {
        self.stubs.push(stub);
        self
    }

    pub fn with_stubs(mut self, stubs: impl IntoIterator<Item = Arc<Stub>>) -> Self {
        self.stubs.extend(stubs);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn without_logger(mut self) -> Self {
        self.logger = None;
        self
    }

    pub fn stubs(&self) -> &[Arc<Stub>] {
        &self.stubs
    }

    pub fn logger(&self) -> Option<&Arc<dyn Logger>> {
        self.logger.as_ref()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics::new(self.logger.clone())
    }

    /// Replace the process-wide defaults.
    pub fn install(defaults: Defaults) {
        shared().store(Arc::new(defaults));
    }

    /// Snapshot of the process-wide defaults.
    pub fn current() -> Arc<Defaults> {
        shared().load_full()
    }
}

/// No default stubs; messages go to `tracing`.
impl Default for Defaults {
    fn default() -> Self {
        Self {
            stubs: Vec::new(),
            logger: Some(Arc::new(TracingLogger)),
        }
    }
}

impl fmt::Debug for Defaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defaults")
            .field("stubs", &self.stubs.len())
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::matcher::AnyMatcher;

    #[test]
    fn builder_collects_stubs_in_order() {
        let a = Arc::new(Stub::returning(AnyMatcher, "a"));
        let b = Arc::new(Stub::returning(AnyMatcher, "b"));
        let defaults = Defaults::empty().with_stub(a.clone()).with_stubs([b.clone()]);

        assert_eq!(defaults.stubs().len(), 2);
        assert!(Arc::ptr_eq(&defaults.stubs()[0], &a));
        assert!(Arc::ptr_eq(&defaults.stubs()[1], &b));
        assert!(!defaults.diagnostics().is_enabled());
    }

    #[test]
    fn default_logs_through_tracing() {
        let defaults = Defaults::default();
        assert!(defaults.logger().is_some());
        assert!(defaults.stubs().is_empty());
        assert!(defaults.without_logger().logger().is_none());
    }
}
