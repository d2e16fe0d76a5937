use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

use crate::db::{
    models::{ActivityRecord, WindowSnapshot},
    repositories::records::{insert_record_tx, latest_record_tx, update_duration_tx},
    Database,
};

/// What one heartbeat does to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatDecision {
    /// Open a fresh record at the sample time. Any previous record is closed
    /// implicitly: it simply stops being the latest.
    Start,
    /// Extend the latest record in place.
    Extend {
        record_id: String,
        duration_secs: f64,
    },
}

/// Decide whether `sample` continues the latest record or begins a new one.
///
/// A record is extended only when the payload matches exactly and the gap
/// since the record was last observed is within the merge window. The new
/// duration is recomputed as elapsed time since the record's start, not an
/// additive increment, so it always equals the wall-clock span of the
/// interval regardless of tick jitter or missed ticks.
pub fn resolve(
    latest: Option<&ActivityRecord>,
    sample: &WindowSnapshot,
    now: DateTime<Utc>,
    merge_window: Duration,
) -> HeartbeatDecision {
    let Some(record) = latest else {
        return HeartbeatDecision::Start;
    };

    if record.data != *sample {
        return HeartbeatDecision::Start;
    }

    let gap = now - record.last_observed();
    if gap > merge_window {
        return HeartbeatDecision::Start;
    }

    let elapsed_secs = (now - record.start_time).num_milliseconds() as f64 / 1000.0;
    HeartbeatDecision::Extend {
        record_id: record.id.clone(),
        // Clamped so an extension can never shrink what is already committed.
        duration_secs: elapsed_secs.max(record.duration_secs),
    }
}

/// Apply one sample to the stream. An absent sample is a silent
/// no-observation tick, not an error.
///
/// The read of the latest record and the write it implies are submitted as a
/// single task to the database thread and run inside one transaction, so no
/// concurrent reader or writer can split this read-modify-write.
pub async fn observe(
    db: &Database,
    stream_id: &str,
    sample: Option<WindowSnapshot>,
    now: DateTime<Utc>,
    merge_window: Duration,
) -> Result<()> {
    let Some(snapshot) = sample else {
        return Ok(());
    };

    let stream_id = stream_id.to_string();
    db.execute(move |conn| {
        let tx = conn
            .transaction()
            .context("failed to open heartbeat transaction")?;

        let latest = latest_record_tx(&tx, &stream_id)?;
        match resolve(latest.as_ref(), &snapshot, now, merge_window) {
            HeartbeatDecision::Start => {
                let record = ActivityRecord::open(&stream_id, now, snapshot);
                insert_record_tx(&tx, &record)?;
            }
            HeartbeatDecision::Extend {
                record_id,
                duration_secs,
            } => {
                update_duration_tx(&tx, &record_id, duration_secs)?;
            }
        }

        tx.commit().context("failed to commit heartbeat")?;
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    const STREAM: &str = "window-activity_test";

    fn window(app: &str, title: &str) -> WindowSnapshot {
        WindowSnapshot {
            app: app.into(),
            title: title.into(),
        }
    }

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, secs).unwrap()
    }

    fn open_record(start_secs: u32, duration_secs: f64, data: WindowSnapshot) -> ActivityRecord {
        let mut record = ActivityRecord::open(STREAM, at(start_secs), data);
        record.duration_secs = duration_secs;
        record
    }

    fn window_5s() -> Duration {
        Duration::seconds(5)
    }

    #[test]
    fn first_sample_starts_a_record() {
        let decision = resolve(None, &window("Code.exe", "main.rs"), at(0), window_5s());
        assert_eq!(decision, HeartbeatDecision::Start);
    }

    #[test]
    fn same_payload_within_window_extends_from_start() {
        let record = open_record(0, 3.0, window("Code.exe", "main.rs"));
        let decision = resolve(
            Some(&record),
            &window("Code.exe", "main.rs"),
            at(7),
            window_5s(),
        );
        assert_eq!(
            decision,
            HeartbeatDecision::Extend {
                record_id: record.id.clone(),
                duration_secs: 7.0,
            }
        );
    }

    #[test]
    fn gap_beyond_window_splits() {
        // Last observed at t=3, next sample at t=9: gap of 6s > 5s window.
        let record = open_record(0, 3.0, window("Code.exe", "main.rs"));
        let decision = resolve(
            Some(&record),
            &window("Code.exe", "main.rs"),
            at(9),
            window_5s(),
        );
        assert_eq!(decision, HeartbeatDecision::Start);
    }

    #[test]
    fn gap_exactly_at_window_still_merges() {
        let record = open_record(0, 3.0, window("Code.exe", "main.rs"));
        let decision = resolve(
            Some(&record),
            &window("Code.exe", "main.rs"),
            at(8),
            window_5s(),
        );
        assert!(matches!(decision, HeartbeatDecision::Extend { .. }));
    }

    #[test]
    fn title_change_splits_regardless_of_gap() {
        let record = open_record(0, 1.0, window("firefox", "Tab A"));
        let decision = resolve(Some(&record), &window("firefox", "Tab B"), at(2), window_5s());
        assert_eq!(decision, HeartbeatDecision::Start);
    }

    #[test]
    fn extension_never_shrinks_committed_duration() {
        // A stale clock (now before last_observed) must not lower duration.
        let record = open_record(0, 10.0, window("Code.exe", "main.rs"));
        let decision = resolve(
            Some(&record),
            &window("Code.exe", "main.rs"),
            at(8),
            window_5s(),
        );
        assert_eq!(
            decision,
            HeartbeatDecision::Extend {
                record_id: record.id.clone(),
                duration_secs: 10.0,
            }
        );
    }

    // Store-backed behavior.

    fn temp_db() -> Database {
        let path = std::env::temp_dir().join(format!("focustrace-test-{}.sqlite3", Uuid::new_v4()));
        Database::new(path).expect("test database should open")
    }

    async fn db_with_stream() -> Database {
        let db = temp_db();
        db.create_stream_if_absent(STREAM, "window-activity", "tester")
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn contiguous_samples_collapse_into_one_record() {
        let db = db_with_stream().await;
        let sample = window("Code.exe", "main.rs");

        for secs in [0, 1, 2, 3] {
            observe(&db, STREAM, Some(sample.clone()), at(secs), window_5s())
                .await
                .unwrap();
        }

        let records = db.range_query(STREAM, None, None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start_time, at(0));
        // Final duration spans first sample to last sample.
        assert_eq!(records[0].duration_secs, 3.0);
    }

    #[tokio::test]
    async fn long_gap_produces_two_records() {
        let db = db_with_stream().await;
        let sample = window("Code.exe", "main.rs");

        observe(&db, STREAM, Some(sample.clone()), at(0), window_5s())
            .await
            .unwrap();
        observe(&db, STREAM, Some(sample.clone()), at(1), window_5s())
            .await
            .unwrap();
        // 9s since last observation: beyond the 5s window.
        observe(&db, STREAM, Some(sample.clone()), at(10), window_5s())
            .await
            .unwrap();

        let records = db.range_query(STREAM, None, None).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].start_time, at(10));
        assert_eq!(records[0].duration_secs, 0.0);
        assert_eq!(records[1].start_time, at(0));
        assert_eq!(records[1].duration_secs, 1.0);
    }

    #[tokio::test]
    async fn payload_change_produces_two_records() {
        let db = db_with_stream().await;

        observe(&db, STREAM, Some(window("firefox", "Tab A")), at(0), window_5s())
            .await
            .unwrap();
        observe(&db, STREAM, Some(window("firefox", "Tab B")), at(1), window_5s())
            .await
            .unwrap();

        let records = db.range_query(STREAM, None, None).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn absent_sample_is_transparent() {
        let db = db_with_stream().await;
        let sample = window("Code.exe", "main.rs");

        observe(&db, STREAM, Some(sample.clone()), at(0), window_5s())
            .await
            .unwrap();
        observe(&db, STREAM, None, at(1), window_5s()).await.unwrap();
        observe(&db, STREAM, Some(sample.clone()), at(2), window_5s())
            .await
            .unwrap();

        // The null tick created nothing and the real sample merged as if the
        // null tick never happened.
        let records = db.range_query(STREAM, None, None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_secs, 2.0);
    }
}
