// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-account sync pipeline: refresh → fetch → extract → ingest.

use crate::error::SyncError;
use crate::models::{AccountReport, RefreshResult, RefreshStatus, SyncOutcome, SyncTarget};
use crate::services::ingester::ReadingIngester;
use crate::services::normalize::extract_readings;
use crate::services::providers::ProviderClient;
use crate::services::refresher::TokenRefresher;
use tracing::Instrument;

/// Runs one target through the pipeline.
///
/// Errors never escape `sync`; each one is classified and folded into the
/// returned report.
#[derive(Clone)]
pub struct SyncOrchestrator {
    refresher: TokenRefresher,
    ingester: ReadingIngester,
}

impl SyncOrchestrator {
    pub fn new(refresher: TokenRefresher, ingester: ReadingIngester) -> Self {
        Self {
            refresher,
            ingester,
        }
    }

    pub async fn sync(&self, client: &dyn ProviderClient, target: SyncTarget) -> AccountReport {
        let label = target.label();
        let span = tracing::info_span!(
            "account_sync",
            provider = %target.provider(),
            account = %label,
        );

        let (refresh, outcome) = self.run_pipeline(client, target).instrument(span).await;

        AccountReport {
            target: label,
            refresh,
            outcome,
        }
    }

    async fn run_pipeline(
        &self,
        client: &dyn ProviderClient,
        target: SyncTarget,
    ) -> (RefreshStatus, SyncOutcome) {
        // Step 1: refresh-if-needed (stored-credential accounts only)
        let (target, refresh) = match target {
            SyncTarget::Account(account) => {
                let result = self.refresher.maybe_refresh(client, &account).await;
                let status = RefreshStatus::from(&result);
                match result {
                    RefreshResult::Refreshed(updated) => (SyncTarget::Account(updated), status),
                    RefreshResult::Failed(SyncError::NotFound(id)) => {
                        return (
                            status,
                            SyncOutcome::Skipped {
                                reason: SyncError::NotFound(id),
                            },
                        );
                    }
                    // Stale token: still attempt the fetch
                    RefreshResult::NotNeeded | RefreshResult::Skipped | RefreshResult::Failed(_) => {
                        (SyncTarget::Account(account), status)
                    }
                }
            }
            other => (other, RefreshStatus::NotNeeded),
        };
        let refresh_failed = refresh == RefreshStatus::Failed;

        // Step 2: fetch
        let payload = match client.fetch_readings(&target).await {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    kind = ?error.kind(),
                    refresh_failed,
                    "Fetch failed"
                );
                return (
                    refresh,
                    SyncOutcome::FetchFailed {
                        error,
                        refresh_failed,
                    },
                );
            }
        };

        // Step 3: extract
        let drafts = match extract_readings(&payload) {
            Ok(drafts) => drafts,
            Err(error) => {
                tracing::warn!(error = %error, "Provider payload could not be mapped to readings");
                return (
                    refresh,
                    SyncOutcome::FetchFailed {
                        error,
                        refresh_failed,
                    },
                );
            }
        };

        // Step 4: ingest each reading independently
        let mut ingested = 0;
        let mut errors = Vec::new();
        for draft in drafts {
            match self
                .ingester
                .ingest(
                    target.user_id(),
                    payload.provider,
                    &draft.metric,
                    draft.timestamp,
                    draft.payload,
                )
                .await
            {
                Ok(()) => ingested += 1,
                Err(e) => errors.push(e),
            }
        }

        let outcome = if errors.is_empty() {
            tracing::debug!(ingested, "Account sync complete");
            SyncOutcome::Done { ingested }
        } else {
            tracing::warn!(ingested, failed = errors.len(), "Some readings failed to persist");
            SyncOutcome::PartialFailure { ingested, errors }
        };

        (refresh, outcome)
    }
}
