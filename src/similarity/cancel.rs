//! Cooperative cancellation

use crate::error::{Result, StemsimError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Shared flag checked by comparison tasks between corpus entries
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancel this token on Ctrl-C / SIGTERM
    ///
    /// Only one process-wide handler can be installed.
    pub fn cancel_on_interrupt(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupted, stopping after in-flight comparisons");
            token.cancel();
        })
        .map_err(|e| StemsimError::ConfigError(format!("Failed to install Ctrl-C handler: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_interrupt_handler_leaves_token_live() {
        let token = CancellationToken::new();
        token.cancel_on_interrupt().unwrap();
        assert!(!token.is_cancelled());

        // A second handler in the same process is refused
        let err = CancellationToken::new().cancel_on_interrupt().unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
