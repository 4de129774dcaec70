// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Barrier, Notify};
use wearable_sync::config::Config;
use wearable_sync::db::{FirestoreDb, MemoryStore, ReadingSink, TokenStore};
use wearable_sync::error::{StoreError, SyncError};
use wearable_sync::models::{
    CredentialUpdate, Provider, SyncTarget, WearableAccount, WearableReading,
};
use wearable_sync::routes::create_router;
use wearable_sync::services::{
    CredentialMode, ProviderClient, ProviderPayload, ProviderRegistry, ReadingIngester,
    SchedulerSettings, SyncOrchestrator, SyncScheduler, TokenGrant, TokenRefresher,
};
use wearable_sync::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// An account whose token expires `expires_in` from now.
#[allow(dead_code)]
pub fn account(
    user_id: &str,
    provider: Provider,
    refresh_token: Option<&str>,
    expires_in: Option<Duration>,
) -> WearableAccount {
    WearableAccount::new(
        user_id,
        provider,
        format!("access-{}", user_id),
        refresh_token.map(str::to_string),
        expires_in.map(|d| Utc::now() + d),
    )
}

/// A structurally valid body for each provider.
#[allow(dead_code)]
pub fn valid_body(provider: Provider) -> Value {
    match provider {
        Provider::Fitbit => json!({"sleep": [{"logId": 1, "minutesAsleep": 420}]}),
        Provider::Oura => json!({"data": [{"id": "a1", "total_sleep_duration": 25200}]}),
        Provider::GoogleFit => json!({"bucket": [
            {"startTimeMillis": "1700000000000", "endTimeMillis": "1700086400000", "dataset": []}
        ]}),
    }
}

/// What a scripted fetch does for one target.
#[allow(dead_code)]
#[derive(Clone)]
pub enum FetchBehavior {
    Body(Value),
    Fail(SyncError),
    Panic,
    /// Block until notified, then return the default body.
    WaitFor(Arc<Notify>),
    /// Rendezvous with the other fetches, then return the default body.
    Rendezvous(Arc<Barrier>),
}

/// One observed fetch.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub target: String,
    pub access_token: Option<String>,
}

/// `ProviderClient` fake driven by per-target scripts.
#[allow(dead_code)]
pub struct ScriptedClient {
    provider: Provider,
    mode: CredentialMode,
    default_fetch: Mutex<FetchBehavior>,
    fetch_script: Mutex<HashMap<String, FetchBehavior>>,
    refresh_result: Mutex<Result<TokenGrant, SyncError>>,
    fetch_calls: Mutex<Vec<FetchCall>>,
    refresh_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Signalled each time a fetch starts
    pub fetch_started: Arc<Notify>,
}

#[allow(dead_code)]
impl ScriptedClient {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            mode: CredentialMode::Stored,
            default_fetch: Mutex::new(FetchBehavior::Body(valid_body(provider))),
            fetch_script: Mutex::new(HashMap::new()),
            refresh_result: Mutex::new(Err(SyncError::AuthExpired(
                "no refresh scripted".to_string(),
            ))),
            fetch_calls: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fetch_started: Arc::new(Notify::new()),
        }
    }

    pub fn service_account(provider: Provider) -> Self {
        Self {
            mode: CredentialMode::ServiceAccount,
            ..Self::new(provider)
        }
    }

    /// Behavior for targets without their own script.
    pub fn default_fetch(self, behavior: FetchBehavior) -> Self {
        *self.default_fetch.lock().unwrap() = behavior;
        self
    }

    /// Behavior for one target, keyed by its label (account id).
    pub fn on_fetch(self, target: &str, behavior: FetchBehavior) -> Self {
        self.fetch_script
            .lock()
            .unwrap()
            .insert(target.to_string(), behavior);
        self
    }

    pub fn on_refresh(self, result: Result<TokenGrant, SyncError>) -> Self {
        *self.refresh_result.lock().unwrap() = result;
        self
    }

    pub fn fetch_calls(&self) -> Vec<FetchCall> {
        self.fetch_calls.lock().unwrap().clone()
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn payload(&self, body: Value) -> ProviderPayload {
        ProviderPayload {
            provider: self.provider,
            fetched_at: Utc::now(),
            body,
        }
    }
}

#[async_trait]
impl ProviderClient for ScriptedClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn credential_mode(&self) -> CredentialMode {
        self.mode
    }

    async fn fetch_readings(&self, target: &SyncTarget) -> Result<ProviderPayload, SyncError> {
        let label = target.label();
        let access_token = match target {
            SyncTarget::Account(account) => Some(account.access_token.clone()),
            SyncTarget::ServiceAccount(_) => None,
        };
        self.fetch_calls.lock().unwrap().push(FetchCall {
            target: label.clone(),
            access_token,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.fetch_started.notify_one();

        let behavior = self
            .fetch_script
            .lock()
            .unwrap()
            .get(&label)
            .cloned()
            .unwrap_or_else(|| self.default_fetch.lock().unwrap().clone());

        let result = match behavior {
            FetchBehavior::Body(body) => Ok(self.payload(body)),
            FetchBehavior::Fail(error) => Err(error),
            FetchBehavior::Panic => panic!("scripted fetch panic for {}", label),
            FetchBehavior::WaitFor(gate) => {
                gate.notified().await;
                Ok(self.payload(valid_body(self.provider)))
            }
            FetchBehavior::Rendezvous(barrier) => {
                barrier.wait().await;
                Ok(self.payload(valid_body(self.provider)))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenGrant, SyncError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_result.lock().unwrap().clone()
    }
}

/// Sink that rejects readings stamped at the given epoch milliseconds.
#[allow(dead_code)]
pub struct FlakySink {
    pub inner: MemoryStore,
    pub reject_millis: HashSet<i64>,
}

#[async_trait]
impl ReadingSink for FlakySink {
    async fn append(&self, reading: &WearableReading) -> Result<(), StoreError> {
        if self
            .reject_millis
            .contains(&reading.timestamp.timestamp_millis())
        {
            return Err(StoreError::Backend("write rejected".to_string()));
        }
        self.inner.append(reading).await
    }
}

/// Store whose account listing always fails.
#[allow(dead_code)]
pub struct UnreachableStore;

#[async_trait]
impl TokenStore for UnreachableStore {
    async fn list_accounts(&self, _provider: Provider) -> Result<Vec<WearableAccount>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn update_credentials(
        &self,
        account_id: &str,
        _update: &CredentialUpdate,
    ) -> Result<(), StoreError> {
        Err(StoreError::NotFound(account_id.to_string()))
    }
}

/// Store that also lists accounts already removed from `inner`, as a
/// listing taken just before an unlink would.
#[allow(dead_code)]
pub struct StaleListingStore {
    pub inner: MemoryStore,
    pub removed: Vec<WearableAccount>,
}

#[async_trait]
impl TokenStore for StaleListingStore {
    async fn list_accounts(&self, provider: Provider) -> Result<Vec<WearableAccount>, StoreError> {
        let mut accounts = self.inner.list_accounts(provider).await?;
        accounts.extend(
            self.removed
                .iter()
                .filter(|a| a.provider == provider)
                .cloned(),
        );
        Ok(accounts)
    }

    async fn update_credentials(
        &self,
        account_id: &str,
        update: &CredentialUpdate,
    ) -> Result<(), StoreError> {
        self.inner.update_credentials(account_id, update).await
    }
}

/// Scheduler over the given clients and storage.
#[allow(dead_code)]
pub fn build_scheduler(
    clients: Vec<Arc<dyn ProviderClient>>,
    store: Arc<dyn TokenStore>,
    sink: Arc<dyn ReadingSink>,
    max_concurrent_accounts: usize,
) -> Arc<SyncScheduler> {
    let mut registry = ProviderRegistry::new();
    for client in clients {
        registry.register(client);
    }

    let orchestrator = SyncOrchestrator::new(
        TokenRefresher::new(store.clone()),
        ReadingIngester::new(sink),
    );

    Arc::new(SyncScheduler::new(
        registry,
        store,
        orchestrator,
        SchedulerSettings {
            poll_interval: std::time::Duration::from_secs(1800),
            max_concurrent_accounts,
        },
    ))
}

/// Create a test app backed by in-memory storage and scripted Fitbit and
/// Oura clients. Returns the router, the shared state and the store.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, MemoryStore) {
    let config = Config::test_default();
    let store = MemoryStore::new();

    let scheduler = build_scheduler(
        vec![
            Arc::new(ScriptedClient::new(Provider::Fitbit)),
            Arc::new(ScriptedClient::new(Provider::Oura)),
        ],
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        config.max_concurrent_accounts,
    );

    let state = Arc::new(AppState { config, scheduler });

    (create_router(state.clone()), state, store)
}
