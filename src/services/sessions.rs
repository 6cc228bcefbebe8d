use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::SessionInfo;
use crate::services::error::AuthError;
use crate::services::tokens::TokenService;
use crate::store::Store;

/// Per-principal catalogue of refresh-credential-backed sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn Store>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Active sessions, most recently created first.
    pub async fn list(&self, principal_id: Uuid) -> Result<Vec<SessionInfo>, AuthError> {
        let sessions = self
            .store
            .list_active_sessions(principal_id, Utc::now())
            .await?;
        Ok(sessions.into_iter().map(SessionInfo::from).collect())
    }

    /// Revoke one session. A session that does not exist and a session owned
    /// by someone else both report NotFound.
    pub async fn revoke(&self, principal_id: Uuid, session_id: Uuid) -> Result<(), AuthError> {
        let found = self
            .store
            .revoke_owned_session(
                principal_id,
                session_id,
                Utc::now(),
                crate::models::revoke_reason::REVOKED_BY_OWNER,
            )
            .await?;
        if !found {
            return Err(AuthError::NotFound);
        }
        tracing::info!(principal_id = %principal_id, session_id = %session_id, "Session revoked");
        Ok(())
    }

    /// Revoke every active session except the one backing
    /// `current_token_value`. Returns the number revoked.
    pub async fn revoke_others(
        &self,
        principal_id: Uuid,
        current_token_value: &str,
    ) -> Result<u64, AuthError> {
        let current_hash = TokenService::hash(current_token_value);
        let count = self
            .store
            .revoke_sessions(
                principal_id,
                Some(&current_hash),
                Utc::now(),
                crate::models::revoke_reason::REVOKED_BY_OWNER,
            )
            .await?;
        tracing::info!(principal_id = %principal_id, count, "Revoked other sessions");
        Ok(count)
    }

    /// Revoke every active session, the caller's included. Used by the
    /// password-change, password-reset, and account-disable flows.
    pub async fn revoke_all(&self, principal_id: Uuid, reason: &str) -> Result<u64, AuthError> {
        let count = self
            .store
            .revoke_sessions(principal_id, None, Utc::now(), reason)
            .await?;
        tracing::info!(principal_id = %principal_id, count, reason = %reason, "Revoked all sessions");
        Ok(count)
    }

    /// Delete sessions past expiry. Revocation history for unexpired rows is
    /// kept; only rows no credential can reach anymore are dropped.
    pub async fn sweep(&self) -> Result<u64, AuthError> {
        let removed = self.store.delete_expired_sessions(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed, "Swept expired refresh sessions");
        }
        Ok(removed)
    }
}
