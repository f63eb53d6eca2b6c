//! HTTP trigger surface: `/health` and `/run?mode=candidate|legacy`.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::bootstrap::RunTrigger;
use crate::pipeline::RunMode;

#[derive(Clone)]
pub struct AppState {
    runner: Arc<dyn RunTrigger>,
    /// Held for the duration of a run; a second trigger gets 409.
    in_flight: Arc<tokio::sync::Mutex<()>>,
    utc_offset_hours: i32,
}

impl AppState {
    pub fn new(runner: Arc<dyn RunTrigger>, utc_offset_hours: i32) -> Self {
        Self {
            runner,
            in_flight: Arc::new(tokio::sync::Mutex::new(())),
            utc_offset_hours,
        }
    }

    fn timestamp(&self) -> String {
        let now = Utc::now();
        match FixedOffset::east_opt(self.utc_offset_hours * 3600) {
            Some(tz) => now.with_timezone(&tz).to_rfc3339(),
            None => now.to_rfc3339(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/run", get(run).post(run))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RunParams {
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub status: String,
    pub mode: String,
    pub message: String,
    pub timestamp: String,
}

async fn run(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
) -> (StatusCode, Json<RunResponse>) {
    let raw_mode = params.mode.unwrap_or_default();
    let respond = |code: StatusCode, status: &str, mode: &str, message: String| {
        (
            code,
            Json(RunResponse {
                status: status.to_string(),
                mode: mode.to_string(),
                message,
                timestamp: state.timestamp(),
            }),
        )
    };

    let mode = match raw_mode.parse::<RunMode>() {
        Ok(m) => m,
        Err(e) => return respond(StatusCode::BAD_REQUEST, "error", &raw_mode, e),
    };

    let Ok(_guard) = state.in_flight.try_lock() else {
        tracing::warn!(mode = mode.as_str(), "run requested while another is in progress");
        return respond(
            StatusCode::CONFLICT,
            "error",
            mode.as_str(),
            "a run is already in progress".to_string(),
        );
    };

    match state.runner.trigger(mode, Utc::now()).await {
        Ok(message) => respond(StatusCode::OK, "success", mode.as_str(), message),
        Err(e) => {
            tracing::error!(error = %e, mode = mode.as_str(), "run failed");
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "error",
                mode.as_str(),
                e.to_string(),
            )
        }
    }
}
