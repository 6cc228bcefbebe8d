//! Blacklist entry model - explicitly invalidated access credentials.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Denylist row for one access credential, keyed by its digest.
///
/// The entry only needs to outlive the credential itself: once `expiry_utc`
/// (the credential's own exp claim) passes, signature verification already
/// rejects it and the sweep may delete the row.
#[derive(Debug, Clone, FromRow)]
pub struct BlacklistEntry {
    /// SHA-256 hex digest of the access credential.
    pub token_hash: String,
    pub principal_id: Uuid,
    pub expiry_utc: DateTime<Utc>,
    pub reason: String,
    pub created_utc: DateTime<Utc>,
}

impl BlacklistEntry {
    pub fn new(
        token_hash: String,
        principal_id: Uuid,
        expiry_utc: DateTime<Utc>,
        reason: String,
    ) -> Self {
        Self {
            token_hash,
            principal_id,
            expiry_utc,
            reason,
            created_utc: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }
}
