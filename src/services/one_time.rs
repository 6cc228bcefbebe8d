use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::models::{OneTimeToken, TokenPurpose};
use crate::services::error::AuthError;
use crate::store::Store;

/// Single-use, time-boxed tokens for the out-of-band flows (email
/// verification, password reset).
#[derive(Clone)]
pub struct OneTimeTokenService {
    store: Arc<dyn Store>,
}

impl OneTimeTokenService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Issue a token for (principal, purpose), superseding any live one so
    /// at most a single unconsumed, unexpired token exists per pair.
    pub async fn issue(
        &self,
        principal_id: Uuid,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<OneTimeToken, AuthError> {
        self.store
            .delete_live_one_time_tokens(principal_id, purpose)
            .await?;
        let token = OneTimeToken::new(principal_id, generate_token_value(), purpose, ttl);
        self.store.insert_one_time_token(&token).await?;
        tracing::debug!(
            principal_id = %principal_id,
            purpose = purpose.as_str(),
            "One-time token issued"
        );
        Ok(token)
    }

    /// Resolve a token value to its owner. An unknown value fails NotFound;
    /// an expired one fails Expired and the stale row is deleted on the way
    /// out.
    pub async fn verify(
        &self,
        purpose: TokenPurpose,
        token_value: &str,
    ) -> Result<OneTimeToken, AuthError> {
        let token = self
            .store
            .find_one_time_token(purpose, token_value)
            .await?
            .ok_or(AuthError::NotFound)?;
        if token.is_expired() {
            let _ = self.store.delete_one_time_token(token.token_id).await?;
            return Err(AuthError::Expired);
        }
        Ok(token)
    }

    /// Delete a token; later verifications of its value fail NotFound.
    /// Returns NotFound when another consumer got there first.
    pub async fn consume(&self, token_id: Uuid) -> Result<(), AuthError> {
        let deleted = self.store.delete_one_time_token(token_id).await?;
        if !deleted {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    /// Bulk-delete expired rows across all purposes. Idempotent and safe to
    /// interleave with every other operation.
    pub async fn sweep(&self) -> Result<u64, AuthError> {
        let removed = self.store.delete_expired_one_time_tokens(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed, "Swept expired one-time tokens");
        }
        Ok(removed)
    }
}

/// 256 bits of randomness, hex-encoded.
fn generate_token_value() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
