// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Proactive OAuth token refresh.

use crate::db::TokenStore;
use crate::error::{StoreError, SyncError};
use crate::models::{CredentialUpdate, RefreshResult, WearableAccount};
use crate::services::providers::{CredentialMode, ProviderClient, TokenGrant};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Decides when an account's token needs renewal and performs it.
///
/// Never returns an error: failures come back as `RefreshResult::Failed`
/// and the caller carries on with the stale token.
#[derive(Clone)]
pub struct TokenRefresher {
    store: Arc<dyn TokenStore>,
    margin: Duration,
}

impl TokenRefresher {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            margin: Duration::seconds(TOKEN_REFRESH_MARGIN_SECS),
        }
    }

    /// True when the token expires within the margin (or already has).
    /// Accounts with no recorded expiry are never refreshed.
    pub fn needs_refresh(&self, account: &WearableAccount, now: DateTime<Utc>) -> bool {
        account
            .expires_at
            .is_some_and(|expires_at| expires_at - now < self.margin)
    }

    pub async fn maybe_refresh(
        &self,
        client: &dyn ProviderClient,
        account: &WearableAccount,
    ) -> RefreshResult {
        self.maybe_refresh_at(client, account, Utc::now()).await
    }

    /// Refresh-if-needed as of `now`.
    pub async fn maybe_refresh_at(
        &self,
        client: &dyn ProviderClient,
        account: &WearableAccount,
        now: DateTime<Utc>,
    ) -> RefreshResult {
        if !self.needs_refresh(account, now) {
            return RefreshResult::NotNeeded;
        }

        if client.credential_mode() == CredentialMode::ServiceAccount {
            return RefreshResult::Skipped;
        }

        let Some(refresh_token) = account.refresh_token.as_deref() else {
            tracing::debug!(
                account_id = %account.id,
                "No refresh token, credentials managed externally"
            );
            return RefreshResult::Skipped;
        };

        tracing::info!(
            account_id = %account.id,
            provider = %account.provider,
            expires_at = ?account.expires_at,
            "Access token expiring, refreshing"
        );

        let grant = match client.refresh_token(refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!(
                    account_id = %account.id,
                    provider = %account.provider,
                    error = %e,
                    "Token refresh failed, continuing with stale token"
                );
                return RefreshResult::Failed(as_auth_expired(e));
            }
        };

        let update = match merge_grant(account, grant, Utc::now()) {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!(
                    account_id = %account.id,
                    provider = %account.provider,
                    error = %e,
                    "Unusable token grant, continuing with stale token"
                );
                return RefreshResult::Failed(e);
            }
        };

        match self.store.update_credentials(&account.id, &update).await {
            Ok(()) => {
                tracing::info!(account_id = %account.id, "Token refreshed and stored");
                RefreshResult::Refreshed(account.with_credentials(&update))
            }
            Err(StoreError::NotFound(id)) => {
                tracing::info!(account_id = %id, "Account removed mid-cycle, skipping");
                RefreshResult::Failed(SyncError::NotFound(id))
            }
            Err(e) => {
                tracing::error!(
                    account_id = %account.id,
                    error = %e,
                    "Failed to store refreshed credentials"
                );
                RefreshResult::Failed(e.into())
            }
        }
    }
}

/// New credential triple: fields the grant omits keep their current values.
fn merge_grant(
    account: &WearableAccount,
    grant: TokenGrant,
    now: DateTime<Utc>,
) -> Result<CredentialUpdate, SyncError> {
    let expires_at = match grant.expires_in {
        Some(secs) => Some(expiry_after(now, secs)?),
        None => account.expires_at,
    };

    Ok(CredentialUpdate {
        access_token: grant.access_token,
        refresh_token: grant.refresh_token.or_else(|| account.refresh_token.clone()),
        expires_at,
    })
}

/// `now + secs`, rejecting lifetimes chrono cannot represent.
pub(crate) fn expiry_after(now: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, SyncError> {
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| SyncError::AuthExpired(format!("token grant has invalid expires_in {}", secs)))
}

fn as_auth_expired(err: SyncError) -> SyncError {
    match err {
        SyncError::AuthExpired(_) => err,
        other => SyncError::AuthExpired(other.to_string()),
    }
}
