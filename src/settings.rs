use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Daemon settings, read once at startup from a JSON file. A missing file
/// means defaults; a present-but-broken file is an error rather than a silent
/// fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen_addr: String,
    pub db_path: PathBuf,
    pub poll_interval_secs: u64,
    /// Maximum gap between same-payload samples still treated as one
    /// continuous interval. Defaults to five poll intervals, tolerating up to
    /// four consecutive missed samples before splitting.
    pub merge_window_secs: Option<u64>,
    pub client_name: String,
    /// Overrides the `window-activity_<hostname>` default.
    pub stream_id: Option<String>,
    /// Path to a JSON category table replacing the built-in one.
    pub categories_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5600".to_string(),
            db_path: PathBuf::from("focustrace.sqlite3"),
            poll_interval_secs: 1,
            merge_window_secs: None,
            client_name: "focustrace-watcher".to_string(),
            stream_id: None,
            categories_path: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings in {}", path.display()))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn merge_window(&self) -> Duration {
        let secs = self
            .merge_window_secs
            .unwrap_or(self.poll_interval_secs.max(1) * 5);
        Duration::seconds(secs as i64)
    }

    pub fn stream_id(&self, hostname: &str) -> String {
        self.stream_id
            .clone()
            .unwrap_or_else(|| format!("window-activity_{hostname}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/focustrace.json")).unwrap();
        assert_eq!(settings.listen_addr, "127.0.0.1:5600");
        assert_eq!(settings.poll_interval_secs, 1);
    }

    #[test]
    fn merge_window_defaults_to_five_intervals() {
        let settings = Settings::default();
        assert_eq!(settings.merge_window(), Duration::seconds(5));

        let slow = Settings {
            poll_interval_secs: 3,
            ..Settings::default()
        };
        assert_eq!(slow.merge_window(), Duration::seconds(15));
    }

    #[test]
    fn explicit_merge_window_overrides_default() {
        let settings = Settings {
            merge_window_secs: Some(30),
            ..Settings::default()
        };
        assert_eq!(settings.merge_window(), Duration::seconds(30));
    }

    #[test]
    fn stream_id_derives_from_hostname() {
        let settings = Settings::default();
        assert_eq!(settings.stream_id("devbox"), "window-activity_devbox");

        let pinned = Settings {
            stream_id: Some("my-stream".into()),
            ..Settings::default()
        };
        assert_eq!(pinned.stream_id("devbox"), "my-stream");
    }
}
