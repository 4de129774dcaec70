// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider API clients.
//!
//! Each client owns its endpoint, date window, auth header scheme and
//! request timeout. Clients never touch the token store; refreshed
//! credentials are handed back to the caller.

pub mod fitbit;
pub mod google_fit;
pub mod oura;
pub mod service_account;

pub use fitbit::FitbitClient;
pub use google_fit::GoogleFitClient;
pub use oura::OuraClient;
pub use service_account::{ServiceAccountAuth, ServiceAccountError, ServiceAccountKey};

use crate::config::Config;
use crate::error::SyncError;
use crate::models::{Provider, SyncTarget};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// How a provider's credentials are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// Per-account OAuth tokens kept in the token store.
    Stored,
    /// A single service-account session owned by the client.
    ServiceAccount,
}

/// Raw provider response, already checked to be structurally decodable.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPayload {
    pub provider: Provider,
    pub fetched_at: DateTime<Utc>,
    pub body: serde_json::Value,
}

/// Successful OAuth refresh-token grant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the new access token in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Capability to fetch raw readings (and refresh tokens, where supported).
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    fn credential_mode(&self) -> CredentialMode;

    /// Fetch the current reading window for `target`.
    async fn fetch_readings(&self, target: &SyncTarget) -> Result<ProviderPayload, SyncError>;

    /// Exchange a refresh token for new credentials.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, SyncError>;
}

/// Build the shared HTTP client with the fixed per-request timeout.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Check the status and decode the body as JSON.
///
/// Non-2xx maps through `SyncError::from_status`; a 2xx body that is not
/// JSON is a `MalformedResponse`.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, SyncError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(status = %status, "Provider rate limit hit (429)");
        }
        return Err(SyncError::from_status(status, &body));
    }

    let bytes = response.bytes().await.map_err(SyncError::from_transport)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SyncError::MalformedResponse(format!("JSON parse error: {}", e)))
}

/// Decode an already-parsed body into the shape a provider promises.
pub(crate) fn expect_shape<T: for<'de> Deserialize<'de>>(
    provider: Provider,
    body: &serde_json::Value,
) -> Result<T, SyncError> {
    T::deserialize(body).map_err(|e| {
        SyncError::MalformedResponse(format!("unexpected {} payload: {}", provider, e))
    })
}

/// Exchange a refresh token at an OAuth token endpoint.
///
/// Any failure, including a malformed grant, is reported as `AuthExpired`.
pub(crate) async fn send_refresh(
    provider: Provider,
    request: reqwest::RequestBuilder,
) -> Result<TokenGrant, SyncError> {
    let response = request.send().await.map_err(|e| {
        SyncError::AuthExpired(format!("{} token refresh request failed: {}", provider, e))
    })?;

    let body = read_json(response).await.map_err(|e| {
        SyncError::AuthExpired(format!("{} token refresh failed: {}", provider, e))
    })?;

    expect_shape::<TokenGrant>(provider, &body)
        .map_err(|e| SyncError::AuthExpired(format!("{} token refresh failed: {}", provider, e)))
}

/// Access token for a stored-credential target.
pub(crate) fn stored_access_token(target: &SyncTarget) -> Result<&str, SyncError> {
    match target {
        SyncTarget::Account(account) => Ok(&account.access_token),
        SyncTarget::ServiceAccount(provider) => Err(SyncError::AuthExpired(format!(
            "{} requires a linked account",
            provider
        ))),
    }
}

/// Setup errors for the provider registry.
#[derive(Debug, thiserror::Error)]
pub enum ProviderSetupError {
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google Fit service account: {0}")]
    ServiceAccount(#[from] ServiceAccountError),
}

/// Configured provider clients, keyed by provider.
///
/// A provider without an entry is not synced at all.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: BTreeMap<Provider, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every client the configuration allows.
    pub fn from_config(config: &Config) -> Result<Self, ProviderSetupError> {
        let http = build_http_client(config.request_timeout)?;
        let mut registry = Self::new();

        for provider in Provider::ALL {
            match provider {
                Provider::Fitbit => {
                    if config.fitbit.is_none() {
                        tracing::warn!("Fitbit client credentials not set, token refresh will fail");
                    }
                    registry.register(Arc::new(FitbitClient::new(
                        http.clone(),
                        config.fitbit.clone(),
                    )));
                }
                Provider::Oura => {
                    if config.oura.is_none() {
                        tracing::warn!("Oura client credentials not set, token refresh will fail");
                    }
                    registry.register(Arc::new(OuraClient::new(http.clone(), config.oura.clone())));
                }
                Provider::GoogleFit => match &config.google_fit_service_account_json {
                    Some(path) => {
                        let auth = ServiceAccountAuth::from_file(path, http.clone())?;
                        tracing::info!(
                            client_email = %auth.client_email(),
                            "Google Fit service account loaded"
                        );
                        registry.register(Arc::new(GoogleFitClient::new(http.clone(), auth)));
                    }
                    None => {
                        tracing::info!("Google Fit service account not configured, skipping");
                    }
                },
            }
        }

        Ok(registry)
    }

    pub fn register(&mut self, client: Arc<dyn ProviderClient>) {
        self.clients.insert(client.provider(), client);
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderClient>> {
        self.clients.get(&provider).cloned()
    }

    /// Providers with a client, in scheduling order.
    pub fn configured(&self) -> Vec<Provider> {
        self.clients.keys().copied().collect()
    }
}
