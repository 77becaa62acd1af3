//! Operator-visible notices

use tracing::warn;

/// Receives single-line notices meant for the operator
pub trait Notifier: Send + Sync {
    fn warn(&self, message: &str);
}

/// Emits notices as `tracing` warnings
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn warn(&self, message: &str) {
        warn!(target: "fleetgrant::notice", "{message}");
    }
}
