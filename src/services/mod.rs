// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - sync engine.

pub mod ingester;
pub mod normalize;
pub mod orchestrator;
pub mod providers;
pub mod refresher;
pub mod scheduler;

pub use ingester::ReadingIngester;
pub use normalize::extract_readings;
pub use orchestrator::SyncOrchestrator;
pub use providers::{
    CredentialMode, FitbitClient, GoogleFitClient, OuraClient, ProviderClient, ProviderPayload,
    ProviderRegistry, ServiceAccountAuth, TokenGrant,
};
pub use refresher::{TokenRefresher, TOKEN_REFRESH_MARGIN_SECS};
pub use scheduler::{SchedulerHandle, SchedulerSettings, SyncScheduler};
