// Status endpoints
//
// GET /widget  dashboard summary of the reconciliation state
// GET /health  200 while checks are recent, 503 otherwise
//
// Handlers only read a snapshot; they never touch the reconciler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use dyncf_core::{HealthStatus, SharedState};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct StatusState {
    pub state: Arc<SharedState>,
    /// interval + grace
    pub staleness_limit: Duration,
}

#[derive(Debug, Serialize)]
struct WidgetResponse {
    last_check: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
    host_count: usize,
    hosts: String,
    current_ip: String,
    status: HealthStatus,
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/widget", get(widget))
        .route("/health", get(health))
        .with_state(state)
}

async fn widget(State(status): State<StatusState>) -> Json<WidgetResponse> {
    let snapshot = status.state.snapshot();
    let health = snapshot.health(Utc::now(), status.staleness_limit);

    Json(WidgetResponse {
        last_check: snapshot.last_check,
        last_update: snapshot.last_update,
        host_count: snapshot.host_count,
        hosts: if snapshot.host_names.is_empty() {
            "None".to_string()
        } else {
            snapshot.host_names.join("\n")
        },
        current_ip: snapshot
            .current_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        status: health,
    })
}

async fn health(State(status): State<StatusState>) -> Response {
    let snapshot = status.state.snapshot();

    if snapshot.health(Utc::now(), status.staleness_limit).is_active() {
        Json(serde_json::json!({ "status": "ok" })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unhealthy",
                "last_check": snapshot.last_check,
            })),
        )
            .into_response()
    }
}
