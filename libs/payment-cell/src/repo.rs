// libs/payment-cell/src/repo.rs
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{PaymentError, WalletLedgerEntry};

/// Persistence seam for the wallet ledger. Entries are append-only.
#[async_trait]
pub trait WalletRepo: Send + Sync {
    async fn append(
        &self,
        entry: WalletLedgerEntry,
        auth_token: &str,
    ) -> Result<(), PaymentError>;

    async fn list_for_owner(
        &self,
        owner_user_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<WalletLedgerEntry>, PaymentError>;
}

// ==============================================================================
// POSTGREST-BACKED IMPLEMENTATION
// ==============================================================================

pub struct PostgrestWalletRepo {
    supabase: Arc<SupabaseClient>,
}

impl PostgrestWalletRepo {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }
}

#[async_trait]
impl WalletRepo for PostgrestWalletRepo {
    async fn append(
        &self,
        entry: WalletLedgerEntry,
        auth_token: &str,
    ) -> Result<(), PaymentError> {
        debug!(
            "Appending {} ledger entry of {} for {}",
            entry.category, entry.amount, entry.owner_user_id
        );

        let _: Value = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/wallet_ledger_entries",
                Some(auth_token),
                Some(json!(entry)),
            )
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn list_for_owner(
        &self,
        owner_user_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<WalletLedgerEntry>, PaymentError> {
        let path = format!(
            "/rest/v1/wallet_ledger_entries?owner_user_id=eq.{}&order=created_at.asc",
            owner_user_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<WalletLedgerEntry>, _>>()
            .map_err(|e| PaymentError::DatabaseError(format!("Failed to parse ledger: {}", e)))
    }
}

// ==============================================================================
// IN-MEMORY IMPLEMENTATION (tests)
// ==============================================================================

#[derive(Default)]
pub struct InMemoryWalletRepo {
    entries: RwLock<Vec<WalletLedgerEntry>>,
}

impl InMemoryWalletRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<WalletLedgerEntry> {
        self.entries.read().unwrap().clone()
    }

    pub fn entries_for_appointment(&self, appointment_id: Uuid) -> Vec<WalletLedgerEntry> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.related_appointment_id == appointment_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WalletRepo for InMemoryWalletRepo {
    async fn append(
        &self,
        entry: WalletLedgerEntry,
        _auth_token: &str,
    ) -> Result<(), PaymentError> {
        self.entries.write().unwrap().push(entry);
        Ok(())
    }

    async fn list_for_owner(
        &self,
        owner_user_id: Uuid,
        _auth_token: &str,
    ) -> Result<Vec<WalletLedgerEntry>, PaymentError> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.owner_user_id == owner_user_id)
            .cloned()
            .collect())
    }
}
