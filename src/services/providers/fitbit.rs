// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Web API client.
//!
//! Handles:
//! - Today's sleep log (`/1.2/user/-/sleep/date/today.json`)
//! - Refresh-token grants with HTTP Basic client authentication

use super::{
    expect_shape, read_json, send_refresh, stored_access_token, CredentialMode, ProviderClient,
    ProviderPayload, TokenGrant,
};
use crate::config::OAuthClientCredentials;
use crate::error::SyncError;
use crate::models::{Provider, SyncTarget};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;

const FITBIT_API_BASE: &str = "https://api.fitbit.com";

/// Shape check for the sleep-log response.
#[derive(Debug, Deserialize)]
struct FitbitSleepResponse {
    #[allow(dead_code)]
    sleep: Vec<serde_json::Value>,
}

/// Fitbit API client.
#[derive(Clone)]
pub struct FitbitClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<OAuthClientCredentials>,
}

impl FitbitClient {
    /// Create a Fitbit client; `credentials` are only needed for refresh.
    pub fn new(http: reqwest::Client, credentials: Option<OAuthClientCredentials>) -> Self {
        Self {
            http,
            base_url: FITBIT_API_BASE.to_string(),
            credentials,
        }
    }

    /// Point the client at a different host (API and token endpoint).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn sleep_url(&self) -> String {
        format!("{}/1.2/user/-/sleep/date/today.json", self.base_url)
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.base_url)
    }
}

/// `Authorization` value for Fitbit's client authentication.
fn basic_auth_header(credentials: &OAuthClientCredentials) -> String {
    let raw = format!("{}:{}", credentials.client_id, credentials.client_secret);
    format!("Basic {}", BASE64.encode(raw))
}

#[async_trait]
impl ProviderClient for FitbitClient {
    fn provider(&self) -> Provider {
        Provider::Fitbit
    }

    fn credential_mode(&self) -> CredentialMode {
        CredentialMode::Stored
    }

    async fn fetch_readings(&self, target: &SyncTarget) -> Result<ProviderPayload, SyncError> {
        let access_token = stored_access_token(target)?;

        let response = self
            .http
            .get(self.sleep_url())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(SyncError::from_transport)?;

        let body = read_json(response).await?;
        expect_shape::<FitbitSleepResponse>(Provider::Fitbit, &body)?;

        Ok(ProviderPayload {
            provider: Provider::Fitbit,
            fetched_at: chrono::Utc::now(),
            body,
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, SyncError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            SyncError::AuthExpired("fitbit client credentials not configured".to_string())
        })?;

        let request = self
            .http
            .post(self.token_url())
            .header(reqwest::header::AUTHORIZATION, basic_auth_header(credentials))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ]);

        send_refresh(Provider::Fitbit, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_header_encodes_id_and_secret() {
        let creds = OAuthClientCredentials {
            client_id: "22ABCD".to_string(),
            client_secret: "s3cret".to_string(),
        };
        // base64("22ABCD:s3cret")
        assert_eq!(basic_auth_header(&creds), "Basic MjJBQkNEOnMzY3JldA==");
    }

    #[test]
    fn test_default_endpoints() {
        let client = FitbitClient::new(reqwest::Client::new(), None);
        assert_eq!(
            client.sleep_url(),
            "https://api.fitbit.com/1.2/user/-/sleep/date/today.json"
        );
        assert_eq!(client.token_url(), "https://api.fitbit.com/oauth2/token");
    }
}
