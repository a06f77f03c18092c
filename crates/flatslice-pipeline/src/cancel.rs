//! Cooperative cancellation for long-running stages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::PipelineError;

/// Shared flag checked at row and polygon boundaries.
///
/// Clones share the same flag, so a caller can hand one clone to the
/// pipeline and keep another to cancel from a different thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] if [`cancel`](Self::cancel)
    /// has been called on any clone of this flag.
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());
        other.cancel();
        assert!(flag.is_cancelled());
        assert!(matches!(flag.check(), Err(PipelineError::Cancelled)));
    }
}
