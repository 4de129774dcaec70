// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Linked wearable account model.

use crate::models::Provider;
use chrono::{DateTime, Utc};
use std::fmt;

/// One (user, provider) credential link.
///
/// Tokens are kept out of `Debug` output so accounts can be logged safely.
#[derive(Clone, PartialEq, Eq)]
pub struct WearableAccount {
    /// Store identifier (`{user_id}:{provider}`)
    pub id: String,
    /// Owning user
    pub user_id: String,
    pub provider: Provider,
    /// Current OAuth access token
    pub access_token: String,
    /// OAuth refresh token (absent for externally managed credentials)
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl WearableAccount {
    /// Build an account whose id follows the one-account-per-(user, provider) rule.
    pub fn new(
        user_id: impl Into<String>,
        provider: Provider,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            id: Self::account_id(&user_id, provider),
            user_id,
            provider,
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    /// Store identifier for a (user, provider) pair.
    pub fn account_id(user_id: &str, provider: Provider) -> String {
        format!("{}:{}", user_id, provider)
    }

    /// Return a copy of this account with new credentials applied.
    pub fn with_credentials(&self, update: &CredentialUpdate) -> Self {
        Self {
            access_token: update.access_token.clone(),
            refresh_token: update.refresh_token.clone(),
            expires_at: update.expires_at,
            ..self.clone()
        }
    }
}

impl fmt::Debug for WearableAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WearableAccount")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Full replacement of an account's credential triple.
///
/// Stores write all three fields together or not at all.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for CredentialUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialUpdate")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// What a single pipeline run syncs.
#[derive(Debug, Clone)]
pub enum SyncTarget {
    /// A user-linked account using its own OAuth credentials.
    Account(WearableAccount),
    /// An org-level fetch under a service-account session (no user).
    ServiceAccount(Provider),
}

impl SyncTarget {
    pub fn provider(&self) -> Provider {
        match self {
            SyncTarget::Account(account) => account.provider,
            SyncTarget::ServiceAccount(provider) => *provider,
        }
    }

    /// Owning user, if any.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            SyncTarget::Account(account) => Some(&account.user_id),
            SyncTarget::ServiceAccount(_) => None,
        }
    }

    /// Label used in logs and summaries.
    pub fn label(&self) -> String {
        match self {
            SyncTarget::Account(account) => account.id.clone(),
            SyncTarget::ServiceAccount(provider) => format!("service-account:{}", provider),
        }
    }
}
