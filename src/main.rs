// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wearable-Sync Server
//!
//! Runs the per-provider sync timers and a small status/trigger API.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wearable_sync::{
    config::Config,
    db::{FirestoreDb, MemoryStore, ReadingSink, TokenStore},
    services::{
        ProviderRegistry, ReadingIngester, SchedulerSettings, SyncOrchestrator, SyncScheduler,
        TokenRefresher,
    },
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        poll_interval_secs = config.poll_interval.as_secs(),
        max_concurrent_accounts = config.max_concurrent_accounts,
        "Starting Wearable-Sync"
    );

    // Storage backend: Firestore when a project is configured
    let (store, sink): (Arc<dyn TokenStore>, Arc<dyn ReadingSink>) = match &config.gcp_project_id
    {
        Some(project_id) => {
            let db = Arc::new(
                FirestoreDb::new(project_id)
                    .await
                    .expect("Failed to connect to Firestore"),
            );
            tracing::info!(project = %project_id, "Firestore storage initialized");
            let store: Arc<dyn TokenStore> = db.clone();
            let sink: Arc<dyn ReadingSink> = db;
            (store, sink)
        }
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, using in-memory storage");
            let memory = Arc::new(MemoryStore::new());
            let store: Arc<dyn TokenStore> = memory.clone();
            let sink: Arc<dyn ReadingSink> = memory;
            (store, sink)
        }
    };

    // Provider clients (Google Fit only with a service account)
    let registry =
        ProviderRegistry::from_config(&config).expect("Failed to initialize provider clients");

    let orchestrator = SyncOrchestrator::new(
        TokenRefresher::new(store.clone()),
        ReadingIngester::new(sink),
    );
    let scheduler = Arc::new(SyncScheduler::new(
        registry,
        store,
        orchestrator,
        SchedulerSettings::from(&config),
    ));
    let timers = scheduler.start();

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        scheduler,
    });

    // Build router
    let app = wearable_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install ctrl+c handler");
        })
        .await?;

    timers.shutdown();
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wearable_sync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
