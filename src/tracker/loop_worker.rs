use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::{models::WindowSnapshot, Database};
use crate::probe::WindowProbe;

use super::heartbeat;
use super::PollConfig;

/// Drives the sampling cadence for one stream. Runs until cancelled; neither
/// probe failures nor store errors terminate the loop.
pub async fn poll_loop(
    db: Database,
    probe: Arc<dyn WindowProbe>,
    config: PollConfig,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.tick);
    // A slow tick skips ahead to the next boundary instead of queueing a
    // backlog of catch-up ticks.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "poll loop started for stream {} (tick {:?}, merge window {}s)",
        config.stream_id,
        config.tick,
        config.merge_window.num_seconds()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                let sample = sample_foreground(&probe, config.tick).await;

                if let Err(err) =
                    heartbeat::observe(&db, &config.stream_id, sample, now, config.merge_window).await
                {
                    // Dropped tick: nothing was persisted, the next tick
                    // proceeds normally and at worst starts a new record.
                    warn!("heartbeat dropped for stream {}: {err:?}", config.stream_id);
                }
            }
            _ = cancel_token.cancelled() => {
                info!("poll loop shutting down");
                break;
            }
        }
    }
}

/// One probe invocation, off the async runtime and bounded by the tick
/// interval. Every failure mode (probe miss, panic, timeout) maps to `None`.
async fn sample_foreground(
    probe: &Arc<dyn WindowProbe>,
    budget: Duration,
) -> Option<WindowSnapshot> {
    let probe = Arc::clone(probe);
    let lookup = tokio::task::spawn_blocking(move || probe.active_window());

    match tokio::time::timeout(budget, lookup).await {
        Ok(Ok(sample)) => sample,
        Ok(Err(err)) => {
            warn!("window probe worker failed: {err}");
            None
        }
        Err(_) => {
            warn!("window probe timed out (> {budget:?})");
            None
        }
    }
}
