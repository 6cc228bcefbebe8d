use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{revoke_reason, Principal, RefreshSession, SessionContext};
use crate::services::error::AuthError;
use crate::services::tokens::{TokenPair, TokenService};
use crate::store::Store;

/// Orchestrates refresh-credential session creation and single-use rotation.
#[derive(Clone)]
pub struct RefreshRotator {
    store: Arc<dyn Store>,
    tokens: TokenService,
    /// When set, presenting an already-retired refresh credential revokes
    /// the whole rotation chain descending from it.
    revoke_on_reuse: bool,
}

impl RefreshRotator {
    pub fn new(store: Arc<dyn Store>, tokens: TokenService, revoke_on_reuse: bool) -> Self {
        Self {
            store,
            tokens,
            revoke_on_reuse,
        }
    }

    /// Issue a credential pair and record the backing session. Used at
    /// login and as the tail of a successful rotation.
    pub async fn open_session(
        &self,
        principal: &Principal,
        context: &SessionContext,
        predecessor_id: Option<Uuid>,
    ) -> Result<TokenPair, AuthError> {
        let session_id = Uuid::new_v4();
        let access_token = self
            .tokens
            .issue_access(principal.principal_id, &principal.email)?;
        let refresh_token = self
            .tokens
            .issue_refresh(principal.principal_id, session_id)?;

        let session = RefreshSession::new(
            session_id,
            principal.principal_id,
            TokenService::hash(&refresh_token),
            self.tokens.refresh_expiry_days(),
            context,
            predecessor_id,
        );
        self.store.insert_session(&session).await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_expiry_seconds(),
        })
    }

    /// Single-use rotation: retire the presented refresh credential's
    /// session and issue a replacement pair.
    ///
    /// The retire step is a conditional update on `revoked_utc`; under
    /// concurrent rotation of the same credential exactly one caller wins
    /// and every other observes `Revoked`. A caller aborting between the
    /// retire and the reply simply loses the session (fail-closed).
    pub async fn rotate(
        &self,
        old_token_value: &str,
        context: &SessionContext,
    ) -> Result<TokenPair, AuthError> {
        let token_hash = TokenService::hash(old_token_value);
        let session = self
            .store
            .find_session_by_hash(&token_hash)
            .await?
            // A forged value and an unknown one are the same thing.
            .ok_or(AuthError::NotFound)?;

        if session.is_revoked() {
            tracing::warn!(
                principal_id = %session.principal_id,
                session_id = %session.session_id,
                "Retired refresh credential presented again"
            );
            if self.revoke_on_reuse {
                self.revoke_descendants(&session).await?;
            }
            return Err(AuthError::Revoked);
        }
        if session.is_expired() {
            return Err(AuthError::Expired);
        }

        let won = self
            .store
            .revoke_session_if_active(session.session_id, Utc::now(), revoke_reason::ROTATED)
            .await?;
        if !won {
            // A concurrent rotation got here first; this caller must
            // re-authenticate rather than receive a duplicate pair.
            return Err(AuthError::Revoked);
        }

        let principal = self
            .store
            .find_principal(session.principal_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        if principal.is_disabled() {
            return Err(AuthError::Unauthorized);
        }

        let pair = self
            .open_session(&principal, context, Some(session.session_id))
            .await?;
        tracing::info!(
            principal_id = %principal.principal_id,
            predecessor = %session.session_id,
            "Refresh credential rotated"
        );
        Ok(pair)
    }

    /// Compromise response: walk the successor links forward from a reused
    /// session and revoke everything still active on that chain.
    async fn revoke_descendants(&self, reused: &RefreshSession) -> Result<(), AuthError> {
        let mut cursor = reused.session_id;
        let mut revoked = 0u64;
        while let Some(successor) = self.store.find_successor(cursor).await? {
            if self
                .store
                .revoke_session_if_active(
                    successor.session_id,
                    Utc::now(),
                    revoke_reason::REUSE_DETECTED,
                )
                .await?
            {
                revoked += 1;
            }
            cursor = successor.session_id;
        }
        if revoked > 0 {
            tracing::warn!(
                principal_id = %reused.principal_id,
                reused_session = %reused.session_id,
                revoked,
                "Revoked rotation chain after refresh credential reuse"
            );
        }
        Ok(())
    }
}
