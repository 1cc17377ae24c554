//! Background eviction of expired transactions, codes and rate-limit windows
//!
//! Lazy expiry on read is what keeps the flow correct; the sweeper only
//! bounds memory when entries are never read again.

use std::sync::Arc;
use std::time::Duration;

use homebase_core::RateLimiter;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::oauth::{AuthorizationCodeService, TransactionService};

/// Run one sweep over both stores. Returns (transactions, codes) evicted.
pub async fn sweep_once(
    transactions: &TransactionService,
    codes: &AuthorizationCodeService,
) -> (usize, usize) {
    let tx_evicted = match transactions.sweep().await {
        Ok(n) => n,
        Err(e) => {
            warn!("[Sweeper] Transaction sweep failed: {}", e);
            0
        }
    };
    let codes_evicted = match codes.sweep().await {
        Ok(n) => n,
        Err(e) => {
            warn!("[Sweeper] Code sweep failed: {}", e);
            0
        }
    };
    (tx_evicted, codes_evicted)
}

/// Spawn the periodic sweeper. A zero interval disables it.
pub fn spawn_sweeper(
    transactions: Arc<TransactionService>,
    codes: Arc<AuthorizationCodeService>,
    limiter: Arc<dyn RateLimiter>,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        info!("[Sweeper] Disabled");
        return None;
    }

    info!("[Sweeper] Running every {:?}", interval);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let (tx_evicted, codes_evicted) = sweep_once(&transactions, &codes).await;
            if tx_evicted + codes_evicted > 0 {
                debug!(
                    transactions = tx_evicted,
                    codes = codes_evicted,
                    "[Sweeper] Evicted expired entries"
                );
            }
            let windows = limiter.evict_expired();
            if windows > 0 {
                debug!(windows, "[Sweeper] Evicted ended rate-limit windows");
            }
        }
    }))
}
