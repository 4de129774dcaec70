// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transient per-account and per-cycle sync results.
//!
//! Nothing here is persisted: outcomes live for one cycle, are folded into a
//! `CycleSummary`, logged, and dropped.

use crate::error::{FailureKind, SyncError};
use crate::models::{Provider, WearableAccount};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Result of the refresh-if-needed step.
#[derive(Debug, Clone)]
pub enum RefreshResult {
    /// Token is outside the expiry buffer (or has no expiry).
    NotNeeded,
    /// No refresh token, or credentials are managed outside the store.
    Skipped,
    /// New credentials were stored; carries the updated account.
    Refreshed(WearableAccount),
    /// The refresh protocol or the credential write failed.
    Failed(SyncError),
}

/// Compact form of `RefreshResult` kept in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    NotNeeded,
    Skipped,
    Refreshed,
    Failed,
}

impl From<&RefreshResult> for RefreshStatus {
    fn from(result: &RefreshResult) -> Self {
        match result {
            RefreshResult::NotNeeded => RefreshStatus::NotNeeded,
            RefreshResult::Skipped => RefreshStatus::Skipped,
            RefreshResult::Refreshed(_) => RefreshStatus::Refreshed,
            RefreshResult::Failed(_) => RefreshStatus::Failed,
        }
    }
}

/// Terminal state of one account's pipeline within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Every extracted reading was written.
    Done { ingested: usize },
    /// At least one reading failed to persist; siblings were still written.
    PartialFailure {
        ingested: usize,
        errors: Vec<SyncError>,
    },
    /// Fetch failed; nothing was ingested.
    FetchFailed {
        error: SyncError,
        refresh_failed: bool,
    },
    /// The account vanished mid-cycle.
    Skipped { reason: SyncError },
}

impl SyncOutcome {
    /// Name of the terminal state.
    pub fn state(&self) -> &'static str {
        match self {
            SyncOutcome::Done { .. } => "done",
            SyncOutcome::PartialFailure { .. } => "partial_failure",
            SyncOutcome::FetchFailed {
                refresh_failed: true,
                ..
            } => "refresh_failed_and_fetch_failed",
            SyncOutcome::FetchFailed { .. } => "fetch_failed",
            SyncOutcome::Skipped { .. } => "skipped",
        }
    }

    pub fn readings_ingested(&self) -> usize {
        match self {
            SyncOutcome::Done { ingested } | SyncOutcome::PartialFailure { ingested, .. } => {
                *ingested
            }
            SyncOutcome::FetchFailed { .. } | SyncOutcome::Skipped { .. } => 0,
        }
    }
}

/// Report for one pipeline run.
#[derive(Debug, Clone)]
pub struct AccountReport {
    /// Account id, or the service-account label
    pub target: String,
    pub refresh: RefreshStatus,
    pub outcome: SyncOutcome,
}

/// Aggregated result of one provider cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub provider: Provider,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub accounts: u32,
    pub done: u32,
    pub partial_failure: u32,
    pub fetch_failed: u32,
    pub skipped: u32,
    /// Pipelines whose task panicked or was cancelled
    pub aborted: u32,
    pub refresh_attempted: u32,
    pub refresh_failed: u32,
    pub readings_ingested: u64,
    /// Failure counts by classification (fetch, refresh and per-reading errors)
    pub failures: BTreeMap<FailureKind, u32>,
}

impl CycleSummary {
    pub fn new(provider: Provider, started_at: DateTime<Utc>) -> Self {
        Self {
            provider,
            started_at,
            finished_at: None,
            accounts: 0,
            done: 0,
            partial_failure: 0,
            fetch_failed: 0,
            skipped: 0,
            aborted: 0,
            refresh_attempted: 0,
            refresh_failed: 0,
            readings_ingested: 0,
            failures: BTreeMap::new(),
        }
    }

    /// Fold one account report into the summary.
    pub fn record(&mut self, report: &AccountReport) {
        self.accounts += 1;

        match report.refresh {
            RefreshStatus::Refreshed => self.refresh_attempted += 1,
            RefreshStatus::Failed => {
                self.refresh_attempted += 1;
                self.refresh_failed += 1;
            }
            RefreshStatus::NotNeeded | RefreshStatus::Skipped => {}
        }

        self.readings_ingested += report.outcome.readings_ingested() as u64;

        match &report.outcome {
            SyncOutcome::Done { .. } => self.done += 1,
            SyncOutcome::PartialFailure { errors, .. } => {
                self.partial_failure += 1;
                for error in errors {
                    self.count_failure(error.kind());
                }
            }
            SyncOutcome::FetchFailed { error, .. } => {
                self.fetch_failed += 1;
                self.count_failure(error.kind());
            }
            SyncOutcome::Skipped { reason } => {
                self.skipped += 1;
                self.count_failure(reason.kind());
            }
        }
    }

    /// Count a pipeline that never produced a report.
    pub fn record_aborted(&mut self) {
        self.accounts += 1;
        self.aborted += 1;
    }

    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = Some(finished_at);
    }

    fn count_failure(&mut self, kind: FailureKind) {
        *self.failures.entry(kind).or_insert(0) += 1;
    }
}

/// Result of asking the scheduler to run a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleResult {
    /// The cycle ran; summary attached.
    Completed(CycleSummary),
    /// A previous cycle for this provider is still running.
    Busy,
    /// The provider has no client configured (e.g. no service account).
    NotConfigured,
    /// Accounts could not be listed; retried on the next tick.
    Aborted { error: String },
}
