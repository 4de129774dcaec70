// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-provider sync cycles.
//!
//! One recurring timer per configured provider. Each tick lists the
//! provider's accounts and fans out one pipeline per account, bounded by the
//! concurrency cap. At most one cycle per provider is in flight; a tick that
//! finds the previous cycle still running is skipped.

use crate::config::Config;
use crate::db::TokenStore;
use crate::models::{CycleResult, CycleSummary, Provider, SyncTarget};
use crate::services::orchestrator::SyncOrchestrator;
use crate::services::providers::{CredentialMode, ProviderClient, ProviderRegistry};
use chrono::Utc;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Timer and fan-out settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    pub max_concurrent_accounts: usize,
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            max_concurrent_accounts: config.max_concurrent_accounts,
        }
    }
}

pub struct SyncScheduler {
    registry: ProviderRegistry,
    store: Arc<dyn TokenStore>,
    orchestrator: Arc<SyncOrchestrator>,
    settings: SchedulerSettings,
    /// Set while a provider's cycle is in flight
    in_flight: DashMap<Provider, Arc<AtomicBool>>,
    /// Most recent completed summary per provider
    latest: DashMap<Provider, CycleSummary>,
}

impl SyncScheduler {
    pub fn new(
        registry: ProviderRegistry,
        store: Arc<dyn TokenStore>,
        orchestrator: SyncOrchestrator,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            registry,
            store,
            orchestrator: Arc::new(orchestrator),
            settings,
            in_flight: DashMap::new(),
            latest: DashMap::new(),
        }
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    /// Providers that get a timer.
    pub fn configured_providers(&self) -> Vec<Provider> {
        self.registry.configured()
    }

    /// Latest completed cycle summary for each provider that has run.
    pub fn latest_summaries(&self) -> Vec<CycleSummary> {
        let mut summaries: Vec<_> = self.latest.iter().map(|e| e.value().clone()).collect();
        summaries.sort_by_key(|s| s.provider);
        summaries
    }

    /// Whether a cycle for `provider` is in flight right now.
    pub fn is_busy(&self, provider: Provider) -> bool {
        self.in_flight
            .get(&provider)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Run one cycle for `provider`, unless one is already running.
    ///
    /// The cycle runs in its own task that owns the busy flag, so dropping
    /// the returned future leaves the cycle running to completion and the
    /// provider busy until it does.
    pub async fn run_cycle(self: &Arc<Self>, provider: Provider) -> CycleResult {
        let Some(client) = self.registry.get(provider) else {
            tracing::info!(provider = %provider, "Provider not configured, skipping cycle");
            return CycleResult::NotConfigured;
        };

        let flag = self
            .in_flight
            .entry(provider)
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();

        let Some(guard) = CycleGuard::acquire(flag) else {
            tracing::info!(provider = %provider, "Previous cycle still running, skipping tick");
            return CycleResult::Busy;
        };

        let scheduler = Arc::clone(self);
        let cycle = tokio::spawn(async move {
            let _guard = guard;
            scheduler.cycle(provider, client).await
        });

        match cycle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(provider = %provider, error = %e, "Sync cycle task failed");
                CycleResult::Aborted {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn cycle(&self, provider: Provider, client: Arc<dyn ProviderClient>) -> CycleResult {
        let started_at = Utc::now();
        tracing::info!(provider = %provider, "Sync cycle starting");

        let targets = match self.load_targets(client.as_ref()).await {
            Ok(targets) => targets,
            Err(error) => {
                tracing::error!(
                    provider = %provider,
                    error = %error,
                    "Failed to list accounts, aborting cycle"
                );
                return CycleResult::Aborted { error };
            }
        };

        let mut summary = CycleSummary::new(provider, started_at);
        let cap = self.settings.max_concurrent_accounts.max(1);

        // Tasks are spawned lazily as buffer slots free up, so at most `cap`
        // pipelines run at once.
        let mut pipelines = stream::iter(targets)
            .map(|target| {
                let orchestrator = Arc::clone(&self.orchestrator);
                let client = Arc::clone(&client);
                tokio::spawn(async move { orchestrator.sync(client.as_ref(), target).await })
            })
            .buffer_unordered(cap);

        while let Some(joined) = pipelines.next().await {
            match joined {
                Ok(report) => {
                    tracing::debug!(
                        provider = %provider,
                        account = %report.target,
                        status = report.outcome.state(),
                        readings = report.outcome.readings_ingested(),
                        "Account pipeline finished"
                    );
                    summary.record(&report);
                }
                Err(e) => {
                    tracing::error!(provider = %provider, error = %e, "Account pipeline aborted");
                    summary.record_aborted();
                }
            }
        }

        summary.finish(Utc::now());

        tracing::info!(
            provider = %provider,
            accounts = summary.accounts,
            done = summary.done,
            partial_failure = summary.partial_failure,
            fetch_failed = summary.fetch_failed,
            skipped = summary.skipped,
            aborted = summary.aborted,
            refresh_attempted = summary.refresh_attempted,
            refresh_failed = summary.refresh_failed,
            readings_ingested = summary.readings_ingested,
            failures = ?summary.failures,
            "Sync cycle complete"
        );

        self.latest.insert(provider, summary.clone());
        CycleResult::Completed(summary)
    }

    async fn load_targets(&self, client: &dyn ProviderClient) -> Result<Vec<SyncTarget>, String> {
        let provider = client.provider();
        match client.credential_mode() {
            CredentialMode::Stored => self
                .store
                .list_accounts(provider)
                .await
                .map(|accounts| accounts.into_iter().map(SyncTarget::Account).collect())
                .map_err(|e| e.to_string()),
            CredentialMode::ServiceAccount => Ok(vec![SyncTarget::ServiceAccount(provider)]),
        }
    }

    /// Start one timer per configured provider.
    ///
    /// The first tick fires immediately. Each tick spawns its cycle so the
    /// timer keeps running while a slow cycle is in flight.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let period = self.settings.poll_interval;
        let mut timers = Vec::new();

        for provider in Provider::ALL {
            if self.registry.get(provider).is_none() {
                tracing::info!(provider = %provider, "Provider not configured, no timer started");
                continue;
            }

            let scheduler = Arc::clone(self);
            timers.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    let scheduler = Arc::clone(&scheduler);
                    tokio::spawn(async move {
                        scheduler.run_cycle(provider).await;
                    });
                }
            }));

            tracing::info!(
                provider = %provider,
                interval_secs = period.as_secs(),
                "Sync timer started"
            );
        }

        SchedulerHandle { timers }
    }
}

/// Holds a provider's busy flag; clears it on drop, including on unwind.
struct CycleGuard {
    flag: Arc<AtomicBool>,
}

impl CycleGuard {
    fn acquire(flag: Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Running provider timers.
pub struct SchedulerHandle {
    timers: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Stop all timers. Cycles already in flight run to completion.
    pub fn shutdown(self) {
        for timer in &self.timers {
            timer.abort();
        }
        tracing::info!(timers = self.timers.len(), "Sync timers stopped");
    }
}
