//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup and handed to each provider client at
//! construction; nothing reads the environment after that.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Cloud Tasks queue allowed to trigger sync cycles.
pub const SYNC_QUEUE_NAME: &str = "wearable-sync";

/// Default cycle interval for every provider (30 minutes).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30 * 60;

/// Default per-request timeout for provider APIs.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Default cap on concurrently syncing accounts per provider.
pub const DEFAULT_MAX_CONCURRENT_ACCOUNTS: usize = 20;

/// OAuth client credentials used for refresh-token grants.
#[derive(Clone)]
pub struct OAuthClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fitbit OAuth client (needed for token refresh)
    pub fitbit: Option<OAuthClientCredentials>,
    /// Oura OAuth client (needed for token refresh)
    pub oura: Option<OAuthClientCredentials>,
    /// Path to the Google Fit service-account key; None disables Google Fit
    pub google_fit_service_account_json: Option<PathBuf>,
    /// Interval between cycles for each provider
    pub poll_interval: Duration,
    /// Per-request timeout for provider APIs
    pub request_timeout: Duration,
    /// Maximum accounts synced concurrently per provider
    pub max_concurrent_accounts: usize,
    /// GCP project for Firestore; None uses the in-memory store
    pub gcp_project_id: Option<String>,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Config for tests: dummy OAuth clients, no Google Fit, default timings.
    pub fn test_default() -> Self {
        Self {
            fitbit: Some(OAuthClientCredentials {
                client_id: "test_fitbit_id".to_string(),
                client_secret: "test_fitbit_secret".to_string(),
            }),
            oura: Some(OAuthClientCredentials {
                client_id: "test_oura_id".to_string(),
                client_secret: "test_oura_secret".to_string(),
            }),
            google_fit_service_account_json: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_concurrent_accounts: DEFAULT_MAX_CONCURRENT_ACCOUNTS,
            gcp_project_id: None,
            port: 8080,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honoured for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            fitbit: oauth_pair("FITBIT_CLIENT_ID", "FITBIT_CLIENT_SECRET"),
            oura: oauth_pair("OURA_CLIENT_ID", "OURA_CLIENT_SECRET"),
            google_fit_service_account_json: non_empty("GOOGLE_FIT_SERVICE_ACCOUNT_JSON")
                .map(PathBuf::from),
            poll_interval: Duration::from_secs(parse_or(
                "SYNC_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            request_timeout: Duration::from_secs(parse_or(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            max_concurrent_accounts: parse_or(
                "SYNC_MAX_CONCURRENT_ACCOUNTS",
                DEFAULT_MAX_CONCURRENT_ACCOUNTS,
            )?
            .max(1),
            gcp_project_id: non_empty("GCP_PROJECT_ID"),
            port: parse_or("PORT", 8080)?,
        })
    }
}

/// Read a variable, treating empty values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Both halves of an OAuth client must be present to be used.
fn oauth_pair(id_var: &str, secret_var: &str) -> Option<OAuthClientCredentials> {
    match (non_empty(id_var), non_empty(secret_var)) {
        (Some(client_id), Some(client_secret)) => Some(OAuthClientCredentials {
            client_id,
            client_secret,
        }),
        (None, None) => None,
        _ => {
            tracing::warn!(
                id_var,
                secret_var,
                "Incomplete OAuth client credentials, token refresh disabled"
            );
            None
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name, raw)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    Invalid(&'static str, String),
}
