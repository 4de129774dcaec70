// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduler status.

use crate::models::{CycleSummary, Provider};
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(status))
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub provider: Provider,
    pub busy: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub poll_interval_secs: u64,
    pub providers: Vec<ProviderStatus>,
    /// Latest completed cycle per provider
    pub cycles: Vec<CycleSummary>,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let scheduler = &state.scheduler;
    let providers = scheduler
        .configured_providers()
        .into_iter()
        .map(|provider| ProviderStatus {
            provider,
            busy: scheduler.is_busy(provider),
        })
        .collect();

    Json(StatusResponse {
        poll_interval_secs: scheduler.settings().poll_interval.as_secs(),
        providers,
        cycles: scheduler.latest_summaries(),
    })
}
