use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::control::PanicButton;
use crate::mission::{MissionStatus, MissionTracker};
use crate::models::{ThoughtCategory, ThoughtEvent};
use crate::positions::{PositionsResponse, PositionsSource};
use crate::thoughts::{StoreError, ThoughtFeed, ThoughtStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ThoughtStore>,
    pub feed: Arc<ThoughtFeed>,
    pub mission: Arc<MissionTracker>,
    pub positions: Arc<PositionsSource>,
    pub panic: Arc<PanicButton>,
    pub admin_token: Option<String>,
}

/// Create the API router. The dashboard frontend is served from `public_dir`
/// as the fallback.
pub fn create_router(state: AppState, public_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/thoughts", get(get_thoughts))
        .route("/api/thoughts/since/:timestamp", get(get_thoughts_since))
        .route("/api/stream", get(stream_thoughts))
        .route("/api/positions", get(get_positions))
        .route("/api/mission", get(get_mission))
        .route("/api/panic", post(post_panic))
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "oracle terminal operational".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        skipped_records: state.store.skipped_records(),
        stream_subscribers: state.feed.subscriber_count(),
    })
}

/// Recent thoughts, newest first, optionally filtered by category
async fn get_thoughts(
    State(state): State<AppState>,
    Query(params): Query<ThoughtsQuery>,
) -> Result<Json<ThoughtsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(100);
    let category = match params.category.as_deref() {
        Some(raw) => Some(
            ThoughtCategory::from_str(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown category: {raw}")))?,
        ),
        None => None,
    };

    let thoughts = state.store.recent(limit, category)?;
    Ok(Json(ThoughtsResponse { thoughts }))
}

/// Thoughts strictly newer than an RFC 3339 cursor (for polling clients)
async fn get_thoughts_since(
    State(state): State<AppState>,
    Path(timestamp): Path<String>,
) -> Result<Json<ThoughtsResponse>, ApiError> {
    let cutoff = DateTime::parse_from_rfc3339(&timestamp)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest(format!("invalid timestamp cursor: {timestamp}")))?;

    let thoughts = state.store.since(cutoff)?;
    Ok(Json(ThoughtsResponse { thoughts }))
}

/// Push-update channel: each new thought as one self-contained JSON record
async fn stream_thoughts(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.feed.subscribe();
    let stream = ReceiverStream::new(rx).map(|thought: ThoughtEvent| {
        let data = serde_json::to_string(&thought).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Positions reshaped for display (live API or local snapshot)
async fn get_positions(
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, ApiError> {
    let resp = state.positions.fetch().await.map_err(ApiError::Internal)?;
    Ok(Json(resp))
}

/// Spend/budget status
async fn get_mission(State(state): State<AppState>) -> Result<Json<MissionStatus>, ApiError> {
    let status = state.mission.status().map_err(ApiError::Internal)?;
    Ok(Json(status))
}

/// Operator-only: run the panic script. Gated by the shared admin token.
async fn post_panic(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<crate::control::PanicOutcome>, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError::ControlDisabled);
    };

    let provided = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided != expected {
        return Err(ApiError::Unauthorized);
    }

    let outcome = state.panic.fire().await.map_err(ApiError::Internal)?;
    Ok(Json(outcome))
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct ThoughtsQuery {
    /// Limit number of results (default 100)
    limit: Option<usize>,
    /// Filter by category ("signal", "decision", ...)
    category: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    skipped_records: u64,
    stream_subscribers: usize,
}

#[derive(Serialize)]
struct ThoughtsResponse {
    thoughts: Vec<ThoughtEvent>,
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    Storage(StoreError),
    Internal(anyhow::Error),
    BadRequest(String),
    Unauthorized,
    ControlDisabled,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidCategory(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Storage(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Storage(err) => {
                tracing::error!("Storage error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Internal(err) => {
                tracing::error!("Request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "invalid admin token".to_string())
            }
            ApiError::ControlDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "panic control not configured".to_string(),
            ),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_category_maps_to_bad_request() {
        let err: ApiError = StoreError::InvalidCategory("prophecy".to_string()).into();
        match err {
            ApiError::BadRequest(msg) => assert!(msg.contains("prophecy")),
            _ => panic!("Expected BadRequest"),
        }
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ApiError = StoreError::StorageUnavailable(io).into();
        assert!(matches!(err, ApiError::Storage(_)));
    }
}
