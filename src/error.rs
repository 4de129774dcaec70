// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the sync pipeline, the stores, and the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Per-account pipeline failure.
///
/// Every variant is caught at the account boundary and turned into a
/// `SyncOutcome`; none of them abort a cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Authorization expired: {0}")]
    AuthExpired(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Persistence failure: {0}")]
    PersistFailure(String),

    #[error("Account not found: {0}")]
    NotFound(String),
}

/// Classification of a `SyncError`, used for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AuthExpired,
    ProviderUnavailable,
    MalformedResponse,
    PersistFailure,
    NotFound,
}

impl SyncError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::AuthExpired(_) => FailureKind::AuthExpired,
            SyncError::ProviderUnavailable(_) => FailureKind::ProviderUnavailable,
            SyncError::MalformedResponse(_) => FailureKind::MalformedResponse,
            SyncError::PersistFailure(_) => FailureKind::PersistFailure,
            SyncError::NotFound(_) => FailureKind::NotFound,
        }
    }

    /// Classify a non-success HTTP status from a provider.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let body: String = body.chars().take(200).collect();
        match status.as_u16() {
            401 | 403 => SyncError::AuthExpired(format!("HTTP {}: {}", status, body)),
            429 => SyncError::ProviderUnavailable(format!("rate limited (HTTP {})", status)),
            _ => SyncError::ProviderUnavailable(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Classify a failed token-endpoint exchange. Outages stay
    /// `ProviderUnavailable`; any other rejection is an auth failure.
    pub fn from_token_exchange_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Self::from_status(status, body);
        }
        let body: String = body.chars().take(200).collect();
        SyncError::AuthExpired(format!("token exchange rejected (HTTP {}): {}", status, body))
    }

    /// Classify a transport-level failure (timeout, connect, body read).
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::ProviderUnavailable(format!("request timed out: {}", err))
        } else if err.is_decode() {
            SyncError::MalformedResponse(err.to_string())
        } else {
            SyncError::ProviderUnavailable(err.to_string())
        }
    }
}

/// Storage-layer error shared by the token store and the reading sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SyncError::NotFound(id),
            StoreError::Backend(msg) => SyncError::PersistFailure(msg),
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
