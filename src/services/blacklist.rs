use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::BlacklistEntry;
use crate::services::error::AuthError;
use crate::services::tokens::TokenService;
use crate::store::Store;

/// Denylist of explicitly invalidated access credentials.
///
/// Entries are keyed by credential digest and carry the credential's own
/// expiry; once that passes, signature verification rejects the credential
/// anyway and the sweep removes the row.
#[derive(Clone)]
pub struct AccessBlacklist {
    store: Arc<dyn Store>,
}

impl AccessBlacklist {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Add a credential to the denylist. Idempotent: re-adding the same
    /// value is a no-op.
    pub async fn add(
        &self,
        token_value: &str,
        principal_id: Uuid,
        natural_expiry: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), AuthError> {
        let entry = BlacklistEntry::new(
            TokenService::hash(token_value),
            principal_id,
            natural_expiry,
            reason.to_string(),
        );
        self.store.insert_blacklist_entry(&entry).await?;
        tracing::debug!(principal_id = %principal_id, reason = %reason, "Access credential blacklisted");
        Ok(())
    }

    pub async fn check(&self, token_value: &str) -> Result<bool, AuthError> {
        let listed = self
            .store
            .blacklist_contains(&TokenService::hash(token_value))
            .await?;
        Ok(listed)
    }

    /// Delete entries whose natural expiry has passed.
    pub async fn sweep(&self) -> Result<u64, AuthError> {
        let removed = self.store.delete_expired_blacklist(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed, "Swept expired blacklist entries");
        }
        Ok(removed)
    }
}
