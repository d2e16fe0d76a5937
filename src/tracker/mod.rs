use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::probe::WindowProbe;

pub mod heartbeat;
mod loop_worker;

use loop_worker::poll_loop;

/// Type tag recorded on streams this tracker writes to.
pub const STREAM_TYPE: &str = "window-activity";

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub stream_id: String,
    /// Client/host identity recorded on the stream at creation.
    pub origin: String,
    pub tick: std::time::Duration,
    pub merge_window: chrono::Duration,
}

/// Owns the background poll loop for the process lifetime.
pub struct TrackerController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl TrackerController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub async fn start(
        &mut self,
        db: Database,
        probe: Arc<dyn WindowProbe>,
        config: PollConfig,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("tracker already running");
        }

        // The stream must exist before the first heartbeat references it.
        db.create_stream_if_absent(&config.stream_id, STREAM_TYPE, &config.origin)
            .await
            .context("failed to ensure tracker stream")?;

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(db, probe, config, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("poll loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for TrackerController {
    fn default() -> Self {
        Self::new()
    }
}
