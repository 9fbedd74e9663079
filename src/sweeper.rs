//! Claim Sweeper
//!
//! Background worker that drops idempotency claims past their retention
//! window so the claim map does not grow without bound. Expiry is also
//! checked lazily on access; the sweeper just reclaims memory for keys
//! nobody retries.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::idempotency::IdempotencyGuard;

/// Configuration for the claim sweeper
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often to sweep expired claims
    pub sweep_interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(300),
        }
    }
}

pub struct ClaimSweeper {
    guard: Arc<IdempotencyGuard>,
    config: SweeperConfig,
}

impl ClaimSweeper {
    pub fn new(guard: Arc<IdempotencyGuard>, config: SweeperConfig) -> Self {
        Self { guard, config }
    }

    /// Create with default configuration
    pub fn with_defaults(guard: Arc<IdempotencyGuard>) -> Self {
        Self::new(guard, SweeperConfig::default())
    }

    /// Run the sweeper loop forever.
    pub async fn run(&self) -> ! {
        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            "Starting claim sweeper"
        );

        loop {
            let swept = self.sweep();
            if swept > 0 {
                info!(swept, live = self.guard.len(), "Swept expired claims");
            } else {
                debug!(live = self.guard.len(), "No expired claims");
            }

            tokio::time::sleep(self.config.sweep_interval).await;
        }
    }

    /// Run a single sweep cycle.
    pub fn sweep(&self) -> usize {
        self.guard.purge_expired()
    }
}
