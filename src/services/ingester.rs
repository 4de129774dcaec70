// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reading persistence.

use crate::db::ReadingSink;
use crate::error::SyncError;
use crate::models::{Provider, WearableReading};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Wraps provider payloads into readings and appends them.
///
/// Every call writes a new reading; identical payloads are not deduplicated.
/// Storage errors are returned as-is, with no retry here.
#[derive(Clone)]
pub struct ReadingIngester {
    sink: Arc<dyn ReadingSink>,
}

impl ReadingIngester {
    pub fn new(sink: Arc<dyn ReadingSink>) -> Self {
        Self { sink }
    }

    /// Write one reading. `user_id` is None for org-level data.
    pub async fn ingest(
        &self,
        user_id: Option<&str>,
        provider: Provider,
        metric: &str,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Result<(), SyncError> {
        let reading = WearableReading {
            user_id: user_id.map(str::to_string),
            provider,
            metric: metric.to_string(),
            timestamp,
            data: payload,
            ingested_at: Utc::now(),
        };

        self.sink.append(&reading).await.map_err(|e| {
            tracing::warn!(
                user_id = ?reading.user_id,
                provider = %provider,
                metric,
                error = %e,
                "Failed to persist reading"
            );
            SyncError::PersistFailure(e.to_string())
        })
    }
}
