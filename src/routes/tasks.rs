// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks, not directly by users.
//! The queue header is checked by `require_tasks_queue`.

use crate::error::{AppError, Result};
use crate::models::{CycleResult, Provider};
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    routing::post,
    Router,
};
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/sync/{provider}", post(sync_provider))
}

/// Run one sync cycle for a provider right now.
///
/// Busy maps to 409 and an aborted cycle to 500 so Cloud Tasks retries.
async fn sync_provider(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Json<CycleResult>> {
    let provider = provider
        .parse::<Provider>()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    tracing::info!(provider = %provider, "Manual sync cycle requested");

    match state.scheduler.run_cycle(provider).await {
        CycleResult::Busy => Err(AppError::Conflict(format!(
            "{} sync cycle already running",
            provider
        ))),
        CycleResult::Aborted { error } => Err(AppError::Internal(anyhow::anyhow!(
            "{} sync cycle aborted: {}",
            provider,
            error
        ))),
        result => Ok(Json(result)),
    }
}
