//! Durable store abstraction.
//!
//! Every component re-reads this store on each call; nothing caches
//! revocation or blacklist state in process memory. The single conditional
//! primitive is [`Store::revoke_session_if_active`], the compare-and-swap on
//! `revoked_utc` that rotation depends on.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{BlacklistEntry, OneTimeToken, Principal, RefreshSession, TokenPurpose};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate key: {0}")]
    Duplicate(&'static str),
}

/// Keyed persistence over the five relations, plus one conditional update.
#[async_trait]
pub trait Store: Send + Sync {
    // -- principals ---------------------------------------------------------

    /// Insert a principal; fails `Duplicate` on an existing email or
    /// (provider, provider_id) pair.
    async fn insert_principal(&self, principal: &Principal) -> Result<(), StoreError>;

    async fn find_principal(&self, principal_id: Uuid) -> Result<Option<Principal>, StoreError>;

    async fn find_principal_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    async fn find_principal_by_provider(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<Principal>, StoreError>;

    async fn set_password_hash(&self, principal_id: Uuid, hash: &str) -> Result<(), StoreError>;

    async fn set_verified(
        &self,
        principal_id: Uuid,
        when: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn set_disabled(
        &self,
        principal_id: Uuid,
        when: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn set_second_factor(
        &self,
        principal_id: Uuid,
        secret: Option<&str>,
        enabled_utc: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    // -- refresh sessions ---------------------------------------------------

    async fn insert_session(&self, session: &RefreshSession) -> Result<(), StoreError>;

    async fn find_session(&self, session_id: Uuid) -> Result<Option<RefreshSession>, StoreError>;

    async fn find_session_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshSession>, StoreError>;

    /// The session created to replace `session_id`, if any.
    async fn find_successor(
        &self,
        session_id: Uuid,
    ) -> Result<Option<RefreshSession>, StoreError>;

    /// Active (unrevoked, unexpired) sessions, most recently issued first.
    async fn list_active_sessions(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, StoreError>;

    /// Compare-and-swap on `revoked_utc`: set it to `now` only if still
    /// null. Returns true when this call performed the transition.
    async fn revoke_session_if_active(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, StoreError>;

    /// Revoke a session owned by `principal_id`. Returns false when no such
    /// session exists for that owner (absence and foreign ownership are not
    /// distinguished).
    async fn revoke_owned_session(
        &self,
        principal_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, StoreError>;

    /// Revoke every active session of a principal, optionally sparing the
    /// one matching `exclude_hash`. Returns the number revoked.
    async fn revoke_sessions(
        &self,
        principal_id: Uuid,
        exclude_hash: Option<&str>,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<u64, StoreError>;

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    // -- access blacklist ---------------------------------------------------

    /// Idempotent: inserting an already-present digest is a no-op.
    async fn insert_blacklist_entry(&self, entry: &BlacklistEntry) -> Result<(), StoreError>;

    async fn blacklist_contains(&self, token_hash: &str) -> Result<bool, StoreError>;

    async fn delete_expired_blacklist(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    // -- one-time tokens ----------------------------------------------------

    /// Delete any unexpired token for (principal, purpose).
    async fn delete_live_one_time_tokens(
        &self,
        principal_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<(), StoreError>;

    async fn insert_one_time_token(&self, token: &OneTimeToken) -> Result<(), StoreError>;

    async fn find_one_time_token(
        &self,
        purpose: TokenPurpose,
        token_value: &str,
    ) -> Result<Option<OneTimeToken>, StoreError>;

    /// Returns true when a row was deleted.
    async fn delete_one_time_token(&self, token_id: Uuid) -> Result<bool, StoreError>;

    async fn delete_expired_one_time_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
