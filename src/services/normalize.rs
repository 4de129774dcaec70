// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider payload → reading drafts.
//!
//! Payloads stay opaque: a draft carries the provider's own document (or one
//! bucket of it) untouched, plus the metric and observation time.

use crate::error::SyncError;
use crate::models::{Provider, ReadingDraft, METRIC_SLEEP};
use crate::services::providers::ProviderPayload;
use crate::time_utils::from_epoch_millis;
use chrono::{DateTime, Utc};

/// Extract the readings a payload maps to.
pub fn extract_readings(payload: &ProviderPayload) -> Result<Vec<ReadingDraft>, SyncError> {
    match payload.provider {
        // One daily sleep document per fetch, stamped at fetch time.
        Provider::Fitbit | Provider::Oura => Ok(vec![ReadingDraft {
            metric: METRIC_SLEEP.to_string(),
            timestamp: payload.fetched_at,
            payload: payload.body.clone(),
        }]),
        Provider::GoogleFit => google_fit_buckets(&payload.body),
    }
}

/// One reading per aggregate bucket, stamped at the bucket start.
fn google_fit_buckets(body: &serde_json::Value) -> Result<Vec<ReadingDraft>, SyncError> {
    let buckets = body
        .get("bucket")
        .and_then(|b| b.as_array())
        .ok_or_else(|| SyncError::MalformedResponse("google_fit payload has no buckets".into()))?;

    buckets
        .iter()
        .map(|bucket| {
            Ok(ReadingDraft {
                metric: METRIC_SLEEP.to_string(),
                timestamp: bucket_start(bucket)?,
                payload: bucket.clone(),
            })
        })
        .collect()
}

/// Google encodes `startTimeMillis` as a decimal string; accept numbers too.
fn bucket_start(bucket: &serde_json::Value) -> Result<DateTime<Utc>, SyncError> {
    let raw = bucket.get("startTimeMillis");
    let millis = raw
        .and_then(|v| v.as_str().and_then(|s| s.parse::<i64>().ok()).or_else(|| v.as_i64()))
        .ok_or_else(|| {
            SyncError::MalformedResponse(format!("bucket has invalid startTimeMillis: {:?}", raw))
        })?;

    from_epoch_millis(millis).ok_or_else(|| {
        SyncError::MalformedResponse(format!("bucket start out of range: {}", millis))
    })
}
