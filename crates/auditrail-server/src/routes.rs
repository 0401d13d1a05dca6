//! HTTP routes.
//!
//! - `POST /v1/events`: record one event (JSON body), `201` with the stored event
//! - `GET /v1/events`: query with `tenant`, `actorId`, `action`, `targetId`,
//!   `since`, `until` (RFC 3339) and `limit`
//! - `GET /healthz`: liveness and the active backend

use std::sync::Arc;
use std::time::Duration;

use auditrail_core::{Context, Event, Query as EventQuery, Recorder};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// Maximum accepted request body.
pub const MAX_BODY_BYTES: usize = 1 << 20;
/// Limit used when the request gives none, or one outside `1..=MAX_LIMIT`.
pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;

/// Shared handler state.
pub struct AppState {
    recorder: Recorder,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(recorder: Recorder, request_timeout: Duration) -> Self {
        Self {
            recorder,
            request_timeout,
        }
    }

    fn request_context(&self) -> Context {
        Context::with_timeout(self.request_timeout)
    }
}

/// Query string of `GET /v1/events`. Values are parsed by hand so that a
/// bad `limit` falls back to the default instead of failing the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsParams {
    tenant: Option<String>,
    actor_id: Option<String>,
    action: Option<String>,
    target_id: Option<String>,
    since: Option<String>,
    until: Option<String>,
    limit: Option<String>,
}

impl EventsParams {
    fn into_query(self) -> Result<EventQuery, ApiError> {
        let limit = self
            .limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|n| (1..=MAX_LIMIT).contains(n))
            .unwrap_or(DEFAULT_LIMIT);

        Ok(EventQuery {
            tenant: self.tenant,
            actor_id: self.actor_id,
            action: self.action,
            target_id: self.target_id,
            since: parse_time("since", self.since.as_deref())?,
            until: parse_time("until", self.until.as_deref())?,
            limit: Some(limit),
        })
    }
}

fn parse_time(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| ApiError::BadRequest(format!("invalid {}: {}", name, e))),
    }
}

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handle_health))
        .route("/v1/events", get(handle_query).post(handle_record))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_record(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Event>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(event) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let ctx = state.request_context();
    let stored = state.recorder.record(&ctx, event).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn handle_query(
    State(state): State<Arc<AppState>>,
    params: Result<Query<EventsParams>, QueryRejection>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let query = params.into_query()?;

    let ctx = state.request_context();
    let events = state.recorder.query(&ctx, &query).await?;
    Ok(Json(events))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "service": "auditrail-server",
        "backend": state.recorder.storage().backend(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
