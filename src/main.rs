use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use focustrace::{
    api::{self, ApiState},
    categorize::CategoryRules,
    db::Database,
    probe::SystemProbe,
    query::QueryService,
    settings::Settings,
    tracker::{PollConfig, TrackerController},
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("focustrace starting up...");

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("focustrace.json"));
    let settings = Settings::load(&settings_path)?;

    let rules = match settings.categories_path.as_deref() {
        Some(path) => Arc::new(CategoryRules::load(path)?),
        None => Arc::new(CategoryRules::default()),
    };

    let hostname = sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string());
    let stream_id = settings.stream_id(&hostname);

    let db = Database::new(settings.db_path.clone())?;

    let mut tracker = TrackerController::new();
    tracker
        .start(
            db.clone(),
            Arc::new(SystemProbe::new()),
            PollConfig {
                stream_id: stream_id.clone(),
                origin: format!("{}@{}", settings.client_name, hostname),
                tick: settings.poll_interval(),
                merge_window: settings.merge_window(),
            },
        )
        .await
        .context("failed to start tracker")?;

    let query = QueryService::new(db, rules);
    let state = ApiState {
        query,
        hostname,
        primary_stream: stream_id,
    };

    api::serve(&settings.listen_addr, state).await
}
