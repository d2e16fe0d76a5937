use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    helpers::{datetime_error, parse_datetime},
    models::{ActivityRecord, WindowSnapshot},
    Database,
};

fn row_to_record(row: &Row) -> Result<ActivityRecord, rusqlite::Error> {
    let start_time_str: String = row.get("start_time")?;

    Ok(ActivityRecord {
        id: row.get("id")?,
        stream_id: row.get("stream_id")?,
        start_time: parse_datetime(&start_time_str, "start_time").map_err(datetime_error)?,
        duration_secs: row.get("duration_secs")?,
        data: WindowSnapshot {
            app: row.get("app")?,
            title: row.get("title")?,
        },
    })
}

// Connection-level primitives, usable both from the async wrappers below and
// from inside a single transaction on the database thread (the heartbeat
// path needs its read and write to share one task).

pub(crate) fn insert_record_tx(conn: &Connection, record: &ActivityRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO records (id, stream_id, start_time, duration_secs, app, title)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id,
            record.stream_id,
            record.start_time.to_rfc3339(),
            record.duration_secs,
            record.data.app,
            record.data.title,
        ],
    )
    .with_context(|| "failed to insert activity record")?;
    Ok(())
}

pub(crate) fn latest_record_tx(
    conn: &Connection,
    stream_id: &str,
) -> Result<Option<ActivityRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, stream_id, start_time, duration_secs, app, title
         FROM records
         WHERE stream_id = ?1
         ORDER BY start_time DESC
         LIMIT 1",
    )?;

    let record = stmt.query_row(params![stream_id], row_to_record).optional()?;
    Ok(record)
}

pub(crate) fn update_duration_tx(
    conn: &Connection,
    record_id: &str,
    duration_secs: f64,
) -> Result<()> {
    // MAX keeps committed durations monotonic even if a stale extension
    // reaches the store late.
    conn.execute(
        "UPDATE records
         SET duration_secs = MAX(duration_secs, ?1)
         WHERE id = ?2",
        params![duration_secs, record_id],
    )
    .with_context(|| "failed to update record duration")?;
    Ok(())
}

impl Database {
    pub async fn append_record(&self, record: &ActivityRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| insert_record_tx(conn, &record)).await
    }

    /// Most recently started record of the stream, if any.
    pub async fn latest_record(&self, stream_id: &str) -> Result<Option<ActivityRecord>> {
        let stream_id = stream_id.to_string();
        self.execute(move |conn| latest_record_tx(conn, &stream_id))
            .await
    }

    pub async fn update_duration(&self, record_id: &str, duration_secs: f64) -> Result<()> {
        let record_id = record_id.to_string();
        self.execute(move |conn| update_duration_tx(conn, &record_id, duration_secs))
            .await
    }

    /// Records whose start time falls inside `[start, end]` (both bounds
    /// inclusive, either may be absent), most recent first. An unknown stream
    /// yields an empty sequence.
    pub async fn range_query(
        &self,
        stream_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<ActivityRecord>> {
        let stream_id = stream_id.to_string();
        let start = start.map(|dt| dt.to_rfc3339());
        let end = end.map(|dt| dt.to_rfc3339());
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, stream_id, start_time, duration_secs, app, title
                 FROM records
                 WHERE stream_id = ?1
                   AND (?2 IS NULL OR start_time >= ?2)
                   AND (?3 IS NULL OR start_time <= ?3)
                 ORDER BY start_time DESC",
            )?;

            let records_iter = stmt.query_map(params![stream_id, start, end], row_to_record)?;

            let mut records = Vec::new();
            for record_result in records_iter {
                records.push(record_result?);
            }

            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    const STREAM: &str = "window-activity_test";

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

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, secs).unwrap()
    }

    fn record_at(secs: u32) -> ActivityRecord {
        ActivityRecord::open(
            STREAM,
            at(secs),
            WindowSnapshot {
                app: "Code.exe".into(),
                title: "main.rs".into(),
            },
        )
    }

    #[tokio::test]
    async fn range_query_bounds_are_inclusive_and_ordered() {
        let db = db_with_stream().await;
        for secs in [10, 20, 30] {
            db.append_record(&record_at(secs)).await.unwrap();
        }

        let records = db
            .range_query(STREAM, Some(at(15)), Some(at(30)))
            .await
            .unwrap();

        let starts: Vec<_> = records.iter().map(|r| r.start_time).collect();
        assert_eq!(starts, vec![at(30), at(20)]);
    }

    #[tokio::test]
    async fn unbounded_query_returns_everything_descending() {
        let db = db_with_stream().await;
        for secs in [10, 30, 20] {
            db.append_record(&record_at(secs)).await.unwrap();
        }

        let records = db.range_query(STREAM, None, None).await.unwrap();
        let starts: Vec<_> = records.iter().map(|r| r.start_time).collect();
        assert_eq!(starts, vec![at(30), at(20), at(10)]);
    }

    #[tokio::test]
    async fn unknown_stream_yields_empty_sequence() {
        let db = db_with_stream().await;
        db.append_record(&record_at(10)).await.unwrap();

        let records = db.range_query("other-stream", None, None).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn latest_record_is_newest_by_start_time() {
        let db = db_with_stream().await;
        db.append_record(&record_at(10)).await.unwrap();
        let newest = record_at(20);
        db.append_record(&newest).await.unwrap();

        let latest = db.latest_record(STREAM).await.unwrap().unwrap();
        assert_eq!(latest.id, newest.id);
    }

    #[tokio::test]
    async fn committed_duration_never_decreases() {
        let db = db_with_stream().await;
        let record = record_at(10);
        db.append_record(&record).await.unwrap();

        db.update_duration(&record.id, 12.0).await.unwrap();
        db.update_duration(&record.id, 5.0).await.unwrap();

        let stored = db.latest_record(STREAM).await.unwrap().unwrap();
        assert_eq!(stored.duration_secs, 12.0);
    }
}
