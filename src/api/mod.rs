use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::db::models::{ActivityRecord, WindowSnapshot};
use crate::query::{CategoryTotal, QueryService};

type ApiError = (StatusCode, String);

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub query: QueryService,
    pub hostname: String,
    /// Stream the fixed `/query` endpoint reads from.
    pub primary_stream: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub hostname: String,
    pub version: String,
}

/// Wire form of one activity record. The stored payload stays `{app, title}`;
/// the category label is computed at serve time.
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub timestamp: DateTime<Utc>,
    pub duration: f64,
    pub data: WindowSnapshot,
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/info", get(info_handler))
        .route("/streams/:id/records", get(stream_records))
        .route("/streams/:id/summary", get(stream_summary))
        .route("/query", post(canned_query))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(listen_addr: &str, state: ApiState) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("API listening on http://{listen_addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn internal_error(err: anyhow::Error) -> ApiError {
    warn!("request failed: {err:?}");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// Parse optional RFC 3339 bounds. An unparseable instant or an inverted
/// range is the caller's mistake, reported as 400.
fn parse_range(params: &RangeParams) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ApiError> {
    fn parse(value: &str, field: &str) -> Result<DateTime<Utc>, ApiError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|err| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("invalid {field} '{value}': {err}"),
                )
            })
    }

    let start = params
        .start
        .as_deref()
        .map(|value| parse(value, "start"))
        .transpose()?;
    let end = params
        .end
        .as_deref()
        .map(|value| parse(value, "end"))
        .transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err((
                StatusCode::BAD_REQUEST,
                "range end precedes range start".to_string(),
            ));
        }
    }

    Ok((start, end))
}

fn to_view(query: &QueryService, record: ActivityRecord) -> RecordView {
    let category = query.label(&record);
    RecordView {
        timestamp: record.start_time,
        duration: record.duration_secs,
        data: record.data,
        category,
    }
}

async fn info_handler(State(state): State<ApiState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        hostname: state.hostname.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn stream_records(
    Path(stream_id): Path<String>,
    Query(params): Query<RangeParams>,
    State(state): State<ApiState>,
) -> Result<Json<Vec<RecordView>>, ApiError> {
    let (start, end) = parse_range(&params)?;

    let records = state
        .query
        .query_range(&stream_id, start, end)
        .await
        .map_err(internal_error)?;

    let views = records
        .into_iter()
        .map(|record| to_view(&state.query, record))
        .collect();
    Ok(Json(views))
}

async fn stream_summary(
    Path(stream_id): Path<String>,
    Query(params): Query<RangeParams>,
    State(state): State<ApiState>,
) -> Result<Json<Vec<CategoryTotal>>, ApiError> {
    let (start, end) = parse_range(&params)?;

    let summary = state
        .query
        .category_summary(&stream_id, start, end)
        .await
        .map_err(internal_error)?;

    Ok(Json(summary))
}

/// Legacy fixed-stream query. The body is accepted for wire compatibility
/// but its contents are not interpreted; the response wraps the stream's
/// records in one extra sequence layer for the same reason.
async fn canned_query(
    State(state): State<ApiState>,
    _body: Option<Json<serde_json::Value>>,
) -> Result<Json<Vec<Vec<RecordView>>>, ApiError> {
    let wrapped = state
        .query
        .canned_query(&state.primary_stream)
        .await
        .map_err(internal_error)?;

    let views = wrapped
        .into_iter()
        .map(|records| {
            records
                .into_iter()
                .map(|record| to_view(&state.query, record))
                .collect()
        })
        .collect();
    Ok(Json(views))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(start: Option<&str>, end: Option<&str>) -> RangeParams {
        RangeParams {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        }
    }

    #[test]
    fn absent_bounds_mean_unbounded() {
        let (start, end) = parse_range(&params(None, None)).unwrap();
        assert!(start.is_none());
        assert!(end.is_none());
    }

    #[test]
    fn valid_bounds_parse_to_utc() {
        let (start, end) = parse_range(&params(
            Some("2026-01-01T12:00:00+01:00"),
            Some("2026-01-01T13:00:00Z"),
        ))
        .unwrap();
        assert_eq!(start.unwrap().to_rfc3339(), "2026-01-01T11:00:00+00:00");
        assert_eq!(end.unwrap().to_rfc3339(), "2026-01-01T13:00:00+00:00");
    }

    #[test]
    fn garbage_instant_is_a_client_error() {
        let err = parse_range(&params(Some("yesterday"), None)).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn inverted_range_is_a_client_error() {
        let err = parse_range(&params(
            Some("2026-01-02T00:00:00Z"),
            Some("2026-01-01T00:00:00Z"),
        ))
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
