// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Oura Cloud API v2 client.

use super::{
    expect_shape, read_json, send_refresh, stored_access_token, CredentialMode, ProviderClient,
    ProviderPayload, TokenGrant,
};
use crate::config::OAuthClientCredentials;
use crate::error::SyncError;
use crate::models::{Provider, SyncTarget};
use crate::time_utils::format_date;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

const OURA_API_BASE: &str = "https://api.ouraring.com";

/// Shape check for the sleep collection response.
#[derive(Debug, Deserialize)]
struct OuraSleepResponse {
    #[allow(dead_code)]
    data: Vec<serde_json::Value>,
}

/// Oura API client.
#[derive(Clone)]
pub struct OuraClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<OAuthClientCredentials>,
}

impl OuraClient {
    pub fn new(http: reqwest::Client, credentials: Option<OAuthClientCredentials>) -> Self {
        Self {
            http,
            base_url: OURA_API_BASE.to_string(),
            credentials,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base_url)
    }
}

/// Query window for the sleep collection: start and end are both today.
fn sleep_window(now: DateTime<Utc>) -> [(&'static str, String); 2] {
    let today = format_date(now);
    [("start_date", today.clone()), ("end_date", today)]
}

#[async_trait]
impl ProviderClient for OuraClient {
    fn provider(&self) -> Provider {
        Provider::Oura
    }

    fn credential_mode(&self) -> CredentialMode {
        CredentialMode::Stored
    }

    async fn fetch_readings(&self, target: &SyncTarget) -> Result<ProviderPayload, SyncError> {
        let access_token = stored_access_token(target)?;
        let now = Utc::now();

        let response = self
            .http
            .get(format!("{}/v2/usercollection/sleep", self.base_url))
            .bearer_auth(access_token)
            .query(&sleep_window(now))
            .send()
            .await
            .map_err(SyncError::from_transport)?;

        let body = read_json(response).await?;
        expect_shape::<OuraSleepResponse>(Provider::Oura, &body)?;

        Ok(ProviderPayload {
            provider: Provider::Oura,
            fetched_at: now,
            body,
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, SyncError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            SyncError::AuthExpired("oura client credentials not configured".to_string())
        })?;

        let request = self.http.post(self.token_url()).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ]);

        send_refresh(Provider::Oura, request).await
    }
}
