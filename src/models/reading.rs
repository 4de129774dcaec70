// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ingested wearable readings.

use crate::models::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric name for sleep observations.
pub const METRIC_SLEEP: &str = "sleep";

/// One immutable ingested observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WearableReading {
    /// Owning user (None for org-level service-account data)
    pub user_id: Option<String>,
    pub provider: Provider,
    /// Metric kind ("sleep", "activity", ...)
    pub metric: String,
    /// When the observation was made
    pub timestamp: DateTime<Utc>,
    /// Provider-specific document, stored as-is
    pub data: serde_json::Value,
    /// When this reading was written
    pub ingested_at: DateTime<Utc>,
}

/// A reading extracted from a provider payload, not yet owned or stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingDraft {
    pub metric: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}
