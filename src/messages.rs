//! Host messaging: fire-and-forget informational and warning messages.

/// Receiver for progress and warning messages.  Never used for control flow.
pub trait MessageSink {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Forwards every message to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// Keeps every message in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub messages: std::cell::RefCell<Vec<(bool, String)>>,
}

impl CollectingSink {
    /// The warnings received so far.
    pub fn warnings(&self) -> Vec<String> {
        self.messages.borrow().iter().filter(|(w, _)| *w).map(|(_, m)| m.clone()).collect()
    }
}

impl MessageSink for CollectingSink {
    fn info(&self, message: &str) {
        self.messages.borrow_mut().push((false, message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.messages.borrow_mut().push((true, message.to_string()));
    }
}
