use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{datetime_error, parse_datetime},
    models::Stream,
    Database,
};

fn row_to_stream(row: &Row) -> Result<Stream, rusqlite::Error> {
    let created_at_str: String = row.get("created_at")?;

    Ok(Stream {
        id: row.get("id")?,
        stream_type: row.get("stream_type")?,
        origin: row.get("origin")?,
        created_at: parse_datetime(&created_at_str, "created_at").map_err(datetime_error)?,
    })
}

impl Database {
    /// Create the stream if it does not already exist. An existing stream is
    /// left untouched (create-if-absent, not create-or-error), so startup can
    /// call this unconditionally.
    pub async fn create_stream_if_absent(
        &self,
        id: &str,
        stream_type: &str,
        origin: &str,
    ) -> Result<()> {
        let id = id.to_string();
        let stream_type = stream_type.to_string();
        let origin = origin.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO streams (id, stream_type, origin, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO NOTHING",
                params![id, stream_type, origin, Utc::now().to_rfc3339()],
            )
            .with_context(|| "failed to create stream")?;
            Ok(())
        })
        .await
    }

    pub async fn get_stream(&self, id: &str) -> Result<Option<Stream>> {
        let id = id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, stream_type, origin, created_at
                 FROM streams
                 WHERE id = ?1",
            )?;

            let stream = stmt.query_row(params![id], row_to_stream).optional()?;
            Ok(stream)
        })
        .await
    }
}
