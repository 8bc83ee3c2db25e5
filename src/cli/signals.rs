//! Ctrl+C handling for a recording session

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shutdown signal, tripped by Ctrl+C
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token that is cancelled once shutdown was requested
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown was requested
    pub async fn requested(&self) {
        self.token.cancelled().await
    }

    /// Setup signal handler
    pub fn setup(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    debug!("Received Ctrl+C");
                    token.cancel();
                }
                Err(e) => debug!(error = %e, "Ctrl+C handler unavailable"),
            }
        });
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
