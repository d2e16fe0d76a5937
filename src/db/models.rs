use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The payload of one activity sample: what was in focus. Equality is exact
/// on both fields; a title change alone starts a new activity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub app: String,
    pub title: String,
}

/// A named, append-ordered sequence of activity records from one source.
/// Immutable once created; created lazily on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub id: String,
    pub stream_type: String,
    pub origin: String,
    pub created_at: DateTime<Utc>,
}

/// One continuous interval of focus on a single application/window.
///
/// Within a stream, at most one record is open for extension at any time:
/// the most recently started one. A record becomes immutable once a later,
/// non-matching sample arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub stream_id: String,
    pub start_time: DateTime<Utc>,
    pub duration_secs: f64,
    pub data: WindowSnapshot,
}

impl ActivityRecord {
    /// A fresh record opened at `start_time` with zero accumulated duration.
    pub fn open(stream_id: &str, start_time: DateTime<Utc>, data: WindowSnapshot) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            stream_id: stream_id.to_string(),
            start_time,
            duration_secs: 0.0,
            data,
        }
    }

    /// Instant this record was last observed: its start plus the duration
    /// accumulated so far.
    pub fn last_observed(&self) -> DateTime<Utc> {
        self.start_time + Duration::milliseconds((self.duration_secs * 1000.0).round() as i64)
    }
}
