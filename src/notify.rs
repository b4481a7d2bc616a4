//! User-facing notifications raised by the pipeline.
//!
//! Inject an [`Arc<dyn Notifier>`] to receive the toast-style messages a UI
//! would show: a successful save, a non-blocking warning about a document
//! link, an error that aborted an action. All methods default to no-ops so
//! implementors only override what they display.
//!
//! # Example
//!
//! ```rust
//! use niceia_media::Notifier;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingWarnings {
//!     warnings: AtomicUsize,
//! }
//!
//! impl Notifier for CountingWarnings {
//!     fn warning(&self, message: &str) {
//!         self.warnings.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("warning: {message}");
//!     }
//! }
//!
//! let n: Arc<dyn Notifier> = Arc::new(CountingWarnings { warnings: AtomicUsize::new(0) });
//! n.warning("file may be unavailable");
//! ```

use std::sync::Arc;

/// Receiver for user-visible messages.
///
/// Implementations must be `Send + Sync`: the link verifier may report from a
/// spawned task.
pub trait Notifier: Send + Sync {
    /// An action completed (upload saved, request submitted).
    fn success(&self, message: &str) {
        let _ = message;
    }

    /// Something the user should know about that does not block them.
    fn warning(&self, message: &str) {
        let _ = message;
    }

    /// An action failed and was not committed.
    fn error(&self, message: &str) {
        let _ = message;
    }
}

/// A [`Notifier`] that discards every message.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {}

/// Convenience constructor for a no-op notifier.
pub fn noop_notifier() -> Arc<dyn Notifier> {
    Arc::new(NoopNotifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Notifier for Log {
        fn error(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn defaults_are_noops() {
        let log = Log::default();
        log.success("ok");
        log.warning("careful");
        log.error("boom");
        assert_eq!(*log.0.lock().unwrap(), vec!["boom".to_string()]);
    }

    #[test]
    fn noop_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn Notifier>();
        noop_notifier().warning("ignored");
    }
}
