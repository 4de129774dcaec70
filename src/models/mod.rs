// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the sync engine.

pub mod account;
pub mod outcome;
pub mod provider;
pub mod reading;

pub use account::{CredentialUpdate, SyncTarget, WearableAccount};
pub use outcome::{
    AccountReport, CycleResult, CycleSummary, RefreshResult, RefreshStatus, SyncOutcome,
};
pub use provider::Provider;
pub use reading::{ReadingDraft, WearableReading, METRIC_SLEEP};
