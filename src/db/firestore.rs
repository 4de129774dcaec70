// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed token store and reading sink.
//!
//! - `wearable_accounts/{user_id}:{provider}`: one document per linked account
//! - `wearable_readings/{generated}`: append-only readings

use crate::db::{collections, ReadingSink, TokenStore};
use crate::error::StoreError;
use crate::models::{CredentialUpdate, Provider, WearableAccount, WearableReading};
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreWritePrecondition};
use serde::{Deserialize, Serialize};

/// Stored account document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDocument {
    pub user_id: String,
    pub provider: Provider,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// When the access token expires (RFC3339)
    pub expires_at: Option<String>,
    /// Last credential write (RFC3339)
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl AccountDocument {
    pub fn from_account(account: &WearableAccount) -> Self {
        Self {
            user_id: account.user_id.clone(),
            provider: account.provider,
            access_token: account.access_token.clone(),
            refresh_token: account.refresh_token.clone(),
            expires_at: account.expires_at.map(format_utc_rfc3339),
            updated_at: Some(format_utc_rfc3339(chrono::Utc::now())),
        }
    }

    fn into_account(self) -> WearableAccount {
        // An unparseable expiry is treated as unknown rather than failing the listing.
        let expires_at = self.expires_at.as_deref().and_then(|raw| {
            parse_utc_rfc3339(raw)
                .map_err(|e| {
                    tracing::warn!(
                        user_id = %self.user_id,
                        provider = %self.provider,
                        error = %e,
                        "Ignoring unparseable token expiry"
                    );
                })
                .ok()
        });

        WearableAccount::new(
            self.user_id,
            self.provider,
            self.access_token,
            self.refresh_token,
            expires_at,
        )
    }
}

/// Stored reading document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingDocument {
    pub user_id: Option<String>,
    pub provider: Provider,
    pub metric: String,
    /// Observation time (RFC3339)
    pub timestamp: String,
    pub data: serde_json::Value,
    /// Write time (RFC3339)
    pub ingested_at: String,
}

impl From<&WearableReading> for ReadingDocument {
    fn from(reading: &WearableReading) -> Self {
        Self {
            user_id: reading.user_id.clone(),
            provider: reading.provider,
            metric: reading.metric.clone(),
            timestamp: format_utc_rfc3339(reading.timestamp),
            data: reading.data.clone(),
            ingested_at: format_utc_rfc3339(reading.ingested_at),
        }
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client; every operation returns a backend error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::Backend("Database not connected (offline mode)".to_string()))
    }

    // ─── Account Operations ──────────────────────────────────────

    /// Get one account by id.
    pub async fn get_account(&self, account_id: &str) -> Result<Option<WearableAccount>, StoreError> {
        let doc: Option<AccountDocument> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::WEARABLE_ACCOUNTS)
            .obj()
            .one(account_id)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(doc.map(AccountDocument::into_account))
    }

    /// Create or replace an account (used when a provider is linked).
    pub async fn upsert_account(&self, account: &WearableAccount) -> Result<(), StoreError> {
        let doc = AccountDocument::from_account(account);
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::WEARABLE_ACCOUNTS)
            .document_id(&account.id)
            .object(&doc)
            .execute()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Delete an account (unlink).
    pub async fn delete_account(&self, account_id: &str) -> Result<(), StoreError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::WEARABLE_ACCOUNTS)
            .document_id(account_id)
            .execute()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Readings for a user and metric, newest first.
    pub async fn get_readings_for_user(
        &self,
        user_id: &str,
        metric: &str,
        limit: u32,
    ) -> Result<Vec<ReadingDocument>, StoreError> {
        let user_id = user_id.to_string();
        let metric = metric.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::WEARABLE_READINGS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("metric").eq(metric.clone()),
                ])
            })
            .order_by([("timestamp", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl TokenStore for FirestoreDb {
    async fn list_accounts(&self, provider: Provider) -> Result<Vec<WearableAccount>, StoreError> {
        let docs: Vec<AccountDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::WEARABLE_ACCOUNTS)
            .filter(move |q| q.for_all([q.field("provider").eq(provider.as_str())]))
            .obj()
            .query()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(docs.into_iter().map(AccountDocument::into_account).collect())
    }

    /// Rewrites the whole account document inside a transaction so the
    /// access token, refresh token and expiry commit together. The read is
    /// part of the transaction and the write requires the document to still
    /// exist, so an account deleted in between is `NotFound`, never recreated.
    async fn update_credentials(
        &self,
        account_id: &str,
        update: &CredentialUpdate,
    ) -> Result<(), StoreError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

        let reader = client.clone_with_consistency_selector(
            FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
        );

        let current: Option<AccountDocument> = reader
            .fluent()
            .select()
            .by_id_in(collections::WEARABLE_ACCOUNTS)
            .obj()
            .one(account_id)
            .await
            .map_err(|e| {
                StoreError::Backend(format!("Failed to read account in transaction: {}", e))
            })?;

        let Some(current) = current else {
            let _ = transaction.rollback().await;
            return Err(StoreError::NotFound(account_id.to_string()));
        };

        let updated = AccountDocument {
            access_token: update.access_token.clone(),
            refresh_token: update.refresh_token.clone(),
            expires_at: update.expires_at.map(format_utc_rfc3339),
            updated_at: Some(format_utc_rfc3339(chrono::Utc::now())),
            ..current
        };

        client
            .fluent()
            .update()
            .in_col(collections::WEARABLE_ACCOUNTS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(account_id)
            .object(&updated)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                StoreError::Backend(format!("Failed to add account to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| commit_error(account_id, e))?;

        Ok(())
    }
}

/// A commit whose existence precondition failed means the account was
/// deleted after it was read.
fn commit_error(account_id: &str, err: FirestoreError) -> StoreError {
    match err {
        FirestoreError::DataNotFoundError(_) => StoreError::NotFound(account_id.to_string()),
        other => StoreError::Backend(format!("Transaction commit failed: {}", other)),
    }
}

#[async_trait]
impl ReadingSink for FirestoreDb {
    async fn append(&self, reading: &WearableReading) -> Result<(), StoreError> {
        let doc = ReadingDocument::from(reading);
        let _: ReadingDocument = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::WEARABLE_READINGS)
            .generate_document_id()
            .object(&doc)
            .execute()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}
