// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Fit REST client (service-account session).
//!
//! Fetches `com.google.sleep.segment` aggregated into 24h buckets over the
//! prior day. Credentials come from the client's own service-account
//! session, never from the token store.

use super::{
    expect_shape, read_json, CredentialMode, ProviderClient, ProviderPayload, ServiceAccountAuth,
    TokenGrant,
};
use crate::error::SyncError;
use crate::models::{Provider, SyncTarget};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;

const GOOGLE_FIT_API_BASE: &str = "https://www.googleapis.com";
const SLEEP_SEGMENT_DATA_TYPE: &str = "com.google.sleep.segment";
const BUCKET_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Shape check for the aggregate response.
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[allow(dead_code)]
    bucket: Vec<serde_json::Value>,
}

/// Google Fit API client.
pub struct GoogleFitClient {
    http: reqwest::Client,
    base_url: String,
    auth: ServiceAccountAuth,
}

impl GoogleFitClient {
    pub fn new(http: reqwest::Client, auth: ServiceAccountAuth) -> Self {
        Self {
            http,
            base_url: GOOGLE_FIT_API_BASE.to_string(),
            auth,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Aggregate request body for the 24 hours before `now`.
pub fn aggregate_request(now: DateTime<Utc>) -> serde_json::Value {
    let start = now - Duration::days(1);
    json!({
        "aggregateBy": [{ "dataTypeName": SLEEP_SEGMENT_DATA_TYPE }],
        "bucketByTime": { "durationMillis": BUCKET_MILLIS },
        "startTimeMillis": start.timestamp_millis(),
        "endTimeMillis": now.timestamp_millis(),
    })
}

#[async_trait]
impl ProviderClient for GoogleFitClient {
    fn provider(&self) -> Provider {
        Provider::GoogleFit
    }

    fn credential_mode(&self) -> CredentialMode {
        CredentialMode::ServiceAccount
    }

    async fn fetch_readings(&self, _target: &SyncTarget) -> Result<ProviderPayload, SyncError> {
        let access_token = self.auth.access_token().await?;
        let now = Utc::now();

        let response = self
            .http
            .post(format!(
                "{}/fitness/v1/users/me/dataset:aggregate",
                self.base_url
            ))
            .bearer_auth(access_token)
            .json(&aggregate_request(now))
            .send()
            .await
            .map_err(SyncError::from_transport)?;

        let body = read_json(response).await?;
        expect_shape::<AggregateResponse>(Provider::GoogleFit, &body)?;

        Ok(ProviderPayload {
            provider: Provider::GoogleFit,
            fetched_at: now,
            body,
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenGrant, SyncError> {
        Err(SyncError::AuthExpired(
            "google_fit credentials are managed by the service account".to_string(),
        ))
    }
}
