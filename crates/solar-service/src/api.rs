//! REST API endpoints for the solar-service.
//!
//! # Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`] with a single
//! `message` field. A bad `range` is 400, a missing cold partition is 500,
//! and a store that is temporarily unavailable is 503.
//!
//! # CORS
//!
//! Every response carries `Access-Control-Allow-Origin: *` plus the allowed
//! methods and headers. `OPTIONS /api/data` answers 204 without touching a
//! store.
//!
//! # Example
//!
//! ```ignore
//! use solar_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use solar_store::ArchiveReport;
use solar_types::{RawSample, TimeOfDay};
use time::OffsetDateTime;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::debug;

use crate::ingest::{IngestError, IngestOutcome};
use crate::query::{QueryError, QueryResult};
use crate::range::{RangeSelector, parse_compact_date};
use crate::state::{AppState, TaskStats};

/// Methods advertised to browsers.
pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
/// Request headers advertised to browsers.
pub const ALLOWED_HEADERS: &str = "Content-Type";

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Health and status
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        // Data
        .route("/api/data", get(get_data).options(preflight))
        // Ingestion and archiving triggers
        .route("/api/samples", post(post_sample))
        .route("/api/archive", post(post_archive))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub collector: CollectorStatus,
    pub tasks: Vec<TaskStats>,
}

/// Collector status.
#[derive(Debug, Serialize)]
pub struct CollectorStatus {
    pub running: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    pub uptime_seconds: Option<u64>,
}

/// Collector status and per-task run counters.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let running = state.collector.is_running();
    let started_at = state.collector.started_at();
    let uptime_seconds = started_at.map(|s| {
        let now = OffsetDateTime::now_utc();
        (now - s).whole_seconds().max(0) as u64
    });

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        collector: CollectorStatus {
            running,
            started_at,
            uptime_seconds,
        },
        tasks: state.collector.task_stats().await,
    })
}

/// Query parameters for `/api/data`.
#[derive(Debug, Default, Deserialize)]
pub struct DataQuery {
    /// `day`, `7`, `30` or `YYYYMMDD`.
    pub range: Option<String>,
}

/// Data for a range.
///
/// # Errors
///
/// - [`AppError::BadRequest`] if `range` is missing, repeated or unrecognised
/// - [`AppError::Store`] if a requested partition does not exist
async fn get_data(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DataQuery>, QueryRejection>,
) -> Result<Json<QueryResult>, AppError> {
    let selector = match query {
        Ok(Query(query)) => RangeSelector::parse(query.range.as_deref().unwrap_or_default()),
        Err(rejection) => {
            debug!("Rejected data query: {}", rejection.body_text());
            RangeSelector::Invalid(rejection.body_text())
        }
    };
    let result = state.router.route(&selector).await?;
    Ok(Json(result))
}

/// CORS pre-flight for `/api/data`.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Response to a pushed sample.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SampleResponse {
    Stored { day: String, time: TimeOfDay },
    Stale { time: TimeOfDay, reporting_hour: u8 },
}

/// Ingest a pushed sample.
///
/// Returns 201 when the reading was stored and 200 when the sample was
/// stale and skipped.
async fn post_sample(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<RawSample>,
) -> Result<(StatusCode, Json<SampleResponse>), AppError> {
    match state.ingestor.ingest_sample(&raw).await? {
        IngestOutcome::Stored(reading) => Ok((
            StatusCode::CREATED,
            Json(SampleResponse::Stored {
                day: reading.day_key(),
                time: reading.time_of_day,
            }),
        )),
        IngestOutcome::Stale {
            time_of_day,
            reporting_hour,
        } => Ok((
            StatusCode::OK,
            Json(SampleResponse::Stale {
                time: time_of_day,
                reporting_hour,
            }),
        )),
    }
}

/// Body for `POST /api/archive`. Both fields default to today.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveRequest {
    /// Target partition date as `YYYYMMDD`.
    pub date: Option<String>,
    /// Hot-store day of month to read.
    pub day: Option<u8>,
}

/// Response for a completed archive run.
#[derive(Debug, Serialize)]
pub struct ArchiveResponse {
    pub key: String,
    pub records: usize,
}

impl From<ArchiveReport> for ArchiveResponse {
    fn from(report: ArchiveReport) -> Self {
        Self {
            key: report.key,
            records: report.records,
        }
    }
}

/// Snapshot a hot-store day into the cold tier.
///
/// # Errors
///
/// - [`AppError::BadRequest`] if `date` is not a valid `YYYYMMDD` or `day` is out of range
/// - [`AppError::NotFound`] if the hot store has no readings for the day
async fn post_archive(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ArchiveRequest>,
) -> Result<Json<ArchiveResponse>, AppError> {
    let date = match request.date.as_deref() {
        Some(raw) => parse_compact_date(raw)
            .ok_or_else(|| AppError::BadRequest("Invalid date parameter.".to_string()))?,
        None => state.clock.today(),
    };
    let day = request.day.unwrap_or(date.day());
    if !(1..=31).contains(&day) {
        return Err(AppError::BadRequest("Invalid day parameter.".to_string()));
    }

    let report = state.archiver.archive(date, day, state.clock.now()).await?;
    Ok(Json(report.into()))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
    Store(solar_store::Error),
    Internal(String),
}

impl From<solar_store::Error> for AppError {
    fn from(e: solar_store::Error) -> Self {
        match e {
            solar_store::Error::NoData { .. } => AppError::NotFound(e.to_string()),
            e if e.is_retryable() => AppError::Unavailable(e.to_string()),
            e => AppError::Store(e),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::InvalidRange(_) => AppError::BadRequest(e.to_string()),
            QueryError::Store(e) => e.into(),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Parse(_) => AppError::BadRequest(e.to_string()),
            IngestError::Store(e) => e.into(),
            IngestError::Source(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use solar_store::{ColdStore, HotStore, ObjectColdStore, SqliteHotStore};
    use solar_types::{ColdRecord, Reading};
    use time::Duration;
    use time::macros::date;
    use tower::ServiceExt;

    use crate::clock::{Clock, FixedClock};
    use crate::config::Config;
    use crate::ingest::time_label;

    fn create_test_state() -> Arc<AppState> {
        AppState::new(
            Arc::new(SqliteHotStore::open_in_memory().unwrap()),
            Arc::new(ObjectColdStore::in_memory()),
            Arc::new(FixedClock::new(OffsetDateTime::now_utc())),
            Config::default(),
        )
    }

    async fn response_body(response: axum::response::Response) -> String {
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> axum::response::Response {
        router()
            .with_state(Arc::clone(state))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_json(
        state: &Arc<AppState>,
        uri: &str,
        body: serde_json::Value,
    ) -> axum::response::Response {
        router()
            .with_state(Arc::clone(state))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    fn assert_cors(response: &axum::response::Response) {
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
        assert_eq!(headers["access-control-allow-headers"], "Content-Type");
    }

    fn record(hour: u8, energy: f64) -> ColdRecord {
        ColdRecord {
            time: TimeOfDay::new(hour, 0).unwrap(),
            power: 700.0,
            energy,
            temperature: 22.0,
        }
    }

    async fn put_hot(state: &AppState, hour: u8, energy: f64) {
        let now = state.clock.now();
        state
            .hot
            .put(&Reading {
                time_of_day: TimeOfDay::new(hour, 0).unwrap(),
                day_of_month: now.day(),
                energy_kwh: energy,
                power_w: 700.0,
                temperature_c: 22.0,
                expires_at: now + Duration::days(7),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = create_test_state();
        let response = get(&state, "/api/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);

        let body = response_body(response).await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_preflight() {
        let state = create_test_state();
        let response = router()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/data?range=bogus")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_cors(&response);
        assert!(response_body(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_data_today() {
        let state = create_test_state();
        put_hot(&state, 14, 3.5).await;
        put_hot(&state, 9, 0.5).await;

        let response = get(&state, "/api/data?range=day").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);

        let body = response_body(response).await;
        assert_eq!(
            body,
            r#"[{"time":"09:00","power":700.0,"energy":0.5},{"time":"14:00","power":700.0,"energy":3.5}]"#
        );
    }

    #[tokio::test]
    async fn test_data_window() {
        let state = create_test_state();
        let today = state.clock.today();
        for i in 1..=7 {
            state
                .cold
                .put_partition(
                    today - Duration::days(i),
                    &[record(10, 0.5), record(16, i as f64)],
                )
                .await
                .unwrap();
        }

        let response = get(&state, "/api/data?range=7").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_body(response).await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let points = json.as_array().unwrap();
        assert_eq!(points.len(), 7);
        assert_eq!(points[6]["max_energy"], 1.0);
        assert_eq!(points[0]["max_energy"], 7.0);
        assert!(points[0]["date"].as_str().unwrap() < points[6]["date"].as_str().unwrap());
    }

    #[tokio::test]
    async fn test_data_window_missing_day() {
        let state = create_test_state();
        let today = state.clock.today();
        state
            .cold
            .put_partition(today - Duration::days(1), &[record(16, 1.0)])
            .await
            .unwrap();

        let response = get(&state, "/api/data?range=30").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response_body(response).await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["message"].as_str().unwrap().contains("Partition not found"));
    }

    #[tokio::test]
    async fn test_data_date() {
        let state = create_test_state();
        state
            .cold
            .put_partition(date!(2024 - 07 - 01), &[record(9, 0.4), record(17, 5.5)])
            .await
            .unwrap();

        let response = get(&state, "/api/data?range=20240701").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_body(response).await;
        assert_eq!(
            body,
            r#"[{"time":"09:00","power":700.0,"energy":0.4,"temperature":22.0},{"time":"17:00","power":700.0,"energy":5.5,"temperature":22.0}]"#
        );
    }

    #[tokio::test]
    async fn test_data_date_not_archived() {
        let state = create_test_state();
        let response = get(&state, "/api/data?range=20240701").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_data_invalid_range() {
        let state = create_test_state();
        for uri in [
            "/api/data?range=bogus",
            "/api/data?range=2024071",
            "/api/data?range=14",
            "/api/data",
            "/api/data?range=7&range=30",
            "/api/data?range=day&range=day",
        ] {
            let response = get(&state, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_cors(&response);

            let body = response_body(response).await;
            assert_eq!(body, r#"{"message":"Invalid range parameter."}"#);
        }
    }

    #[tokio::test]
    async fn test_post_sample_stored_and_stale() {
        let state = create_test_state();
        let fresh_hour = (state.clock.now() + Duration::hours(1)).hour();

        let sample = serde_json::json!({
            "time": time_label(fresh_hour, 5),
            "energy": "2.75kWh",
            "power": "1,050W",
            "temperature": "-1.5C",
        });
        let response = post_json(&state, "/api/samples", sample).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert_eq!(json["status"], "stored");
        assert_eq!(json["time"], format!("{:02}:05", fresh_hour));

        let stale = serde_json::json!({
            "time": time_label((fresh_hour + 3) % 24, 0),
            "energy": "2.75kWh",
            "power": "1,050W",
            "temperature": "20C",
        });
        let response = post_json(&state, "/api/samples", stale).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert_eq!(json["status"], "stale");
        assert_eq!(json["reporting_hour"], fresh_hour);

        let day = state.clock.now().day();
        assert_eq!(state.hot.query_day(day).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_post_sample_malformed() {
        let state = create_test_state();
        let sample = serde_json::json!({
            "time": "15:00",
            "energy": "2.75kWh",
            "power": "1,050W",
            "temperature": "20C",
        });
        let response = post_json(&state, "/api/samples", sample).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert!(json["message"].as_str().unwrap().contains("Invalid time label"));
    }

    #[tokio::test]
    async fn test_post_archive_today() {
        let state = create_test_state();
        put_hot(&state, 12, 6.0).await;

        let response = post_json(&state, "/api/archive", serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        let today = state.clock.today();
        assert_eq!(json["key"], solar_store::partition_key(today));
        assert_eq!(json["records"], 1);

        let partition = state.cold.get_partition(today).await.unwrap();
        assert_eq!(partition.max_energy(), Some(6.0));
    }

    #[tokio::test]
    async fn test_post_archive_explicit_date() {
        let state = create_test_state();
        put_hot(&state, 12, 6.0).await;
        let day = state.clock.now().day();

        let response = post_json(
            &state,
            "/api/archive",
            serde_json::json!({ "date": "20240301", "day": day }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.cold.get_partition(date!(2024 - 03 - 01)).await.is_ok());
    }

    #[tokio::test]
    async fn test_post_archive_errors() {
        let state = create_test_state();

        let response = post_json(&state, "/api/archive", serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert!(json["message"].as_str().unwrap().contains("No data found"));

        let response = post_json(
            &state,
            "/api/archive",
            serde_json::json!({ "date": "20241301" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            post_json(&state, "/api/archive", serde_json::json!({ "day": 0 })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_status_endpoint() {
        let state = create_test_state();
        let response = get(&state, "/api/status").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert_eq!(json["collector"]["running"], false);
        assert!(json["collector"]["started_at"].is_null());
        let tasks = json["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0]["task"], "ingest");
    }

    #[test]
    fn test_store_error_mapping() {
        let not_found = AppError::from(solar_store::Error::PartitionNotFound {
            key: "2024/07/2024_07_01.json".into(),
        });
        assert!(matches!(not_found, AppError::Store(_)));

        let no_data = AppError::from(solar_store::Error::NoData { day: 7 });
        assert!(matches!(no_data, AppError::NotFound(_)));

        let io = AppError::from(solar_store::Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out",
        )));
        assert!(matches!(io, AppError::Unavailable(_)));
        assert_eq!(io.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
