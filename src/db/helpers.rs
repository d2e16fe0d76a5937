use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// RFC 3339 strings are the canonical timestamp form in the store. Values are
/// always written via `DateTime<Utc>::to_rfc3339`, which keeps a fixed
/// `+00:00` offset so lexicographic comparison in SQL matches chronology.
pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field} '{value}'"))
}

pub fn datetime_error(err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        err.to_string(),
    )))
}
