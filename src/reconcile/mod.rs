//! Periodic reconciliation.
//!
//! Webhooks are the fast path; the reconciler is the safety net. On a fixed
//! interval it sweeps every open pull request through the same evaluation the
//! event handlers use, which catches missed deliveries, payments that landed
//! while nothing else was happening, and PRs that aged past their limits.

use std::sync::Arc;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::engine::Engine;

/// Runs the reconciliation loop until cancelled.
///
/// Sweep errors are logged and the loop continues; a single bad cycle must
/// not stop future ones.
pub async fn run(engine: Arc<Engine>, period: std::time::Duration, shutdown: CancellationToken) {
    info!(period_secs = period.as_secs(), "reconciler started");

    let mut ticker = interval(period);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("reconciler shutting down");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = engine.sweep(None).await {
                    error!(error = %e, "reconciliation sweep failed");
                }
            }
        }
    }
}
