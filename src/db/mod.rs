//! Storage layer: credential store and reading sink.
//!
//! The sync engine only sees the two traits below. `MemoryStore` backs local
//! runs and tests; `FirestoreDb` backs deployments.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::models::{CredentialUpdate, Provider, WearableAccount, WearableReading};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const WEARABLE_ACCOUNTS: &str = "wearable_accounts";
    pub const WEARABLE_READINGS: &str = "wearable_readings";
}

/// Durable record of each linked account's credentials.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Snapshot of every account linked to `provider`, in no particular order.
    async fn list_accounts(&self, provider: Provider) -> Result<Vec<WearableAccount>, StoreError>;

    /// Replace an account's access token, refresh token and expiry together.
    ///
    /// Returns `StoreError::NotFound` if the account was removed since it was listed.
    async fn update_credentials(
        &self,
        account_id: &str,
        update: &CredentialUpdate,
    ) -> Result<(), StoreError>;
}

/// Append-only destination for ingested readings.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn append(&self, reading: &WearableReading) -> Result<(), StoreError>;
}
