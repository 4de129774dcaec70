// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google service-account session.
//!
//! Signs an RS256 JWT assertion with the key file's private key and
//! exchanges it for a bearer token. The token is cached until it comes
//! within the refresh margin of expiry.

use super::read_json;
use crate::error::SyncError;
use crate::services::refresher::{expiry_after, TOKEN_REFRESH_MARGIN_SECS};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

/// Read-only scope for Google Fit sleep data.
pub const FITNESS_SLEEP_READ_SCOPE: &str = "https://www.googleapis.com/auth/fitness.sleep.read";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Fields consumed from a service-account JSON key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// JWT claims for the token exchange.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct ServiceAccountToken {
    access_token: String,
    expires_in: i64,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Errors loading service-account key material at startup.
#[derive(Debug, thiserror::Error)]
pub enum ServiceAccountError {
    #[error("Failed to read key file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid private key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
}

/// Authorized session for a service account.
pub struct ServiceAccountAuth {
    http: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    /// Held across the exchange so only one exchange runs at a time.
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Load a key file and prepare a session for the Google Fit sleep scope.
    pub fn from_file(path: &Path, http: reqwest::Client) -> Result<Self, ServiceAccountError> {
        let raw = std::fs::read_to_string(path)?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)?;
        Self::from_key(key, http)
    }

    pub fn from_key(key: ServiceAccountKey, http: reqwest::Client) -> Result<Self, ServiceAccountError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(Self {
            http,
            key,
            encoding_key,
            scope: FITNESS_SLEEP_READ_SCOPE.to_string(),
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// A bearer token valid for at least the refresh margin.
    pub async fn access_token(&self) -> Result<String, SyncError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Utc::now() + margin < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.exchange_assertion().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);

        tracing::debug!(client_email = %self.key.client_email, "Service account token refreshed");
        Ok(access_token)
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, SyncError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| SyncError::AuthExpired(format!("Failed to sign assertion: {}", e)))
    }

    async fn exchange_assertion(&self) -> Result<CachedToken, SyncError> {
        let now = Utc::now();
        let assertion = self.sign_assertion(now)?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(SyncError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::from_token_exchange_status(status, &body));
        }
        let body = read_json(response).await?;

        let token: ServiceAccountToken = serde_json::from_value(body).map_err(|e| {
            SyncError::AuthExpired(format!("unexpected token exchange response: {}", e))
        })?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: expiry_after(now, token.expires_in)?,
        })
    }
}
