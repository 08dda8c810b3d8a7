//! HTTP request handlers.
//!
//! Each handler translates a request into a [`Command`] and forwards it to
//! the dispatcher queue.

use super::AppState;
use crate::command::{Command, Reply};
use crate::estimate::LiveSignals;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

/// `ok: false` replies become 400s; the body keeps the same shape.
pub fn reply_response(reply: Reply) -> Response {
    let status = if reply.ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(reply)).into_response()
}

async fn forward(state: &AppState, command: Command) -> Response {
    reply_response(state.commands.send(command).await)
}

// ============================================================================
// Raw command bus
// ============================================================================

pub async fn handle_command(State(state): State<AppState>, Json(command): Json<Command>) -> Response {
    forward(&state, command).await
}

// ============================================================================
// Observers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    pub domain: String,
    pub seconds: i64,
}

pub async fn handle_record_interval(
    State(state): State<AppState>,
    Json(req): Json<IntervalRequest>,
) -> Response {
    forward(
        &state,
        Command::RecordInterval {
            domain: req.domain,
            seconds: req.seconds,
        },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct SignalRequest {
    pub domain: String,
    #[serde(flatten)]
    pub signals: LiveSignals,
}

pub async fn handle_live_signal(State(state): State<AppState>, Json(req): Json<SignalRequest>) -> Response {
    forward(
        &state,
        Command::VideoStats {
            domain: req.domain,
            signals: req.signals,
        },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct FocusRequest {
    #[serde(default, alias = "url")]
    pub domain: Option<String>,
}

pub async fn handle_focus(State(state): State<AppState>, Json(req): Json<FocusRequest>) -> Response {
    forward(&state, Command::Focus { domain: req.domain }).await
}

pub async fn handle_tick(State(state): State<AppState>, Json(req): Json<FocusRequest>) -> Response {
    forward(&state, Command::Tick { domain: req.domain }).await
}

pub async fn handle_suspend(State(state): State<AppState>) -> Response {
    forward(&state, Command::Suspend).await
}

// ============================================================================
// Dashboard reads
// ============================================================================

pub async fn handle_get_today(State(state): State<AppState>) -> Response {
    forward(&state, Command::GetToday).await
}

pub async fn handle_get_history(State(state): State<AppState>) -> Response {
    forward(&state, Command::GetHistory).await
}

pub async fn handle_get_rewards(State(state): State<AppState>) -> Response {
    forward(&state, Command::GetRewardState).await
}

pub async fn handle_get_streak(State(state): State<AppState>) -> Response {
    forward(&state, Command::GetStreakState).await
}

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    1
}

pub async fn handle_predict(State(state): State<AppState>, Query(q): Query<PredictQuery>) -> Response {
    forward(&state, Command::Predict { days_ahead: q.days }).await
}

// ============================================================================
// Settings & gamification
// ============================================================================

pub async fn handle_get_region(State(state): State<AppState>) -> Response {
    forward(&state, Command::GetRegion).await
}

#[derive(Debug, Deserialize)]
pub struct RegionRequest {
    pub region: String,
}

pub async fn handle_set_region(State(state): State<AppState>, Json(req): Json<RegionRequest>) -> Response {
    forward(&state, Command::SetRegion { region: req.region }).await
}

pub async fn handle_advance(State(state): State<AppState>) -> Response {
    forward(&state, Command::UpdateGamification).await
}

pub async fn handle_rebuild(State(state): State<AppState>) -> Response {
    forward(&state, Command::RebuildGamification).await
}

pub async fn handle_toggle(State(state): State<AppState>) -> Response {
    forward(&state, Command::ToggleGamification).await
}

pub async fn handle_maintenance(State(state): State<AppState>) -> Response {
    forward(&state, Command::RunMaintenance).await
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub db_path: String,
    pub retention_days: usize,
    pub region_policy: crate::estimate::RegionPolicy,
    pub maintenance_interval_secs: u64,
    pub stored_keys: Vec<String>,
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.keys() {
        Ok(stored_keys) => Json(StatusResponse {
            db_path: state.config.db_path.clone(),
            retention_days: state.config.retention_days,
            region_policy: state.config.region_policy,
            maintenance_interval_secs: state.config.maintenance_interval_secs,
            stored_keys,
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
