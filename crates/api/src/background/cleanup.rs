//! Periodic reclamation of abandoned import sessions.
//!
//! Runs the engine's [`CleanupSweep`] on a fixed interval using
//! `tokio::time::interval`. What gets reclaimed is the sweep's concern;
//! it logs its own per-pass report.

use std::time::Duration;

use meridian_engine::cleanup::{CleanupOptions, CleanupSweep};
use tokio_util::sync::CancellationToken;

/// Run the cleanup sweep loop.
///
/// Runs until `cancel` is triggered. The first sweep happens
/// immediately, then every `every`.
pub async fn run(
    sweep: CleanupSweep,
    options: CleanupOptions,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = every.as_secs(), "Session cleanup job started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = sweep.run(&options).await {
                    tracing::error!(error = %e, "Session cleanup sweep failed");
                }
            }
        }
    }
}
