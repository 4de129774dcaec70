// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for local runs and tests.

use crate::db::{ReadingSink, TokenStore};
use crate::error::StoreError;
use crate::models::{CredentialUpdate, Provider, WearableAccount, WearableReading};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

/// Account and reading store held in process memory.
///
/// Accounts live in a `DashMap`, so a credential write locks only the shard
/// holding that account; concurrent writes to other accounts proceed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    accounts: Arc<DashMap<String, WearableAccount>>,
    readings: Arc<Mutex<Vec<WearableReading>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account (linking happens outside the sync engine).
    pub fn upsert_account(&self, account: WearableAccount) {
        self.accounts.insert(account.id.clone(), account);
    }

    /// Remove an account, as an unlink would.
    pub fn remove_account(&self, account_id: &str) -> Option<WearableAccount> {
        self.accounts.remove(account_id).map(|(_, account)| account)
    }

    pub fn get_account(&self, account_id: &str) -> Option<WearableAccount> {
        self.accounts.get(account_id).map(|entry| entry.clone())
    }

    /// Snapshot of every reading appended so far.
    pub fn readings(&self) -> Vec<WearableReading> {
        self.readings
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn list_accounts(&self, provider: Provider) -> Result<Vec<WearableAccount>, StoreError> {
        Ok(self
            .accounts
            .iter()
            .filter(|entry| entry.provider == provider)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_credentials(
        &self,
        account_id: &str,
        update: &CredentialUpdate,
    ) -> Result<(), StoreError> {
        // The entry guard is held for the whole replacement, so readers see
        // either the old triple or the new one.
        let mut entry = self
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| StoreError::NotFound(account_id.to_string()))?;

        let updated = entry.with_credentials(update);
        *entry = updated;
        Ok(())
    }
}

#[async_trait]
impl ReadingSink for MemoryStore {
    async fn append(&self, reading: &WearableReading) -> Result<(), StoreError> {
        self.readings
            .lock()
            .map_err(|_| StoreError::Backend("reading store lock poisoned".to_string()))?
            .push(reading.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_list_accounts_filters_by_provider() {
        let store = MemoryStore::new();
        store.upsert_account(WearableAccount::new("1", Provider::Fitbit, "a", None, None));
        store.upsert_account(WearableAccount::new("2", Provider::Oura, "b", None, None));
        store.upsert_account(WearableAccount::new("3", Provider::Fitbit, "c", None, None));

        let mut fitbit = store.list_accounts(Provider::Fitbit).await.unwrap();
        fitbit.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(fitbit.len(), 2);
        assert_eq!(fitbit[0].user_id, "1");
        assert_eq!(fitbit[1].user_id, "3");
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_account_per_user_and_provider() {
        let store = MemoryStore::new();
        store.upsert_account(WearableAccount::new("1", Provider::Fitbit, "old", None, None));
        store.upsert_account(WearableAccount::new("1", Provider::Fitbit, "new", None, None));

        let accounts = store.list_accounts(Provider::Fitbit).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].access_token, "new");
    }

    #[tokio::test]
    async fn test_update_credentials_replaces_triple() {
        let store = MemoryStore::new();
        let account = WearableAccount::new("1", Provider::Fitbit, "old", Some("r".into()), None);
        store.upsert_account(account.clone());

        let expires = Utc::now() + Duration::hours(1);
        store
            .update_credentials(
                &account.id,
                &CredentialUpdate {
                    access_token: "new".into(),
                    refresh_token: Some("r2".into()),
                    expires_at: Some(expires),
                },
            )
            .await
            .unwrap();

        let stored = store.get_account(&account.id).unwrap();
        assert_eq!(stored.access_token, "new");
        assert_eq!(stored.refresh_token.as_deref(), Some("r2"));
        assert_eq!(stored.expires_at, Some(expires));
    }

    #[tokio::test]
    async fn test_update_missing_account_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_credentials(
                "9:oura",
                &CredentialUpdate {
                    access_token: "x".into(),
                    refresh_token: None,
                    expires_at: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("9:oura".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_see_mixed_credentials() {
        let store = MemoryStore::new();
        let base = Utc::now();
        let account = WearableAccount::new(
            "1",
            Provider::Fitbit,
            "access-0",
            Some("refresh-0".into()),
            Some(base),
        );
        store.upsert_account(account.clone());

        let writer = {
            let store = store.clone();
            let id = account.id.clone();
            tokio::spawn(async move {
                for i in 1..=500 {
                    store
                        .update_credentials(
                            &id,
                            &CredentialUpdate {
                                access_token: format!("access-{}", i),
                                refresh_token: Some(format!("refresh-{}", i)),
                                expires_at: Some(base + Duration::seconds(i)),
                            },
                        )
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    for seen in store.list_accounts(Provider::Fitbit).await.unwrap() {
                        let generation = (seen.expires_at.unwrap() - base).num_seconds();
                        assert_eq!(seen.access_token, format!("access-{}", generation));
                        assert_eq!(
                            seen.refresh_token,
                            Some(format!("refresh-{}", generation))
                        );
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();

        let stored = store.get_account(&account.id).unwrap();
        assert_eq!(stored.access_token, "access-500");
    }
}
