//! Refresh session model - one row per live refresh credential.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Revocation reason codes recorded on `revoked_reason`.
pub mod revoke_reason {
    pub const ROTATED: &str = "rotated";
    pub const LOGOUT: &str = "logout";
    pub const REUSE_DETECTED: &str = "reuse_detected";
    pub const REVOKED_BY_OWNER: &str = "revoked_by_owner";
    pub const PASSWORD_CHANGE: &str = "password_change";
    pub const PASSWORD_RESET: &str = "password_reset";
    pub const ACCOUNT_DISABLED: &str = "account_disabled";
}

/// Device context captured at issuance.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Refresh session entity.
///
/// `revoked_utc` transitions null -> timestamp exactly once; the store's
/// conditional update is the only writer of that field.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshSession {
    pub session_id: Uuid,
    pub principal_id: Uuid,
    /// SHA-256 hex digest of the refresh credential; the plaintext value is
    /// never stored.
    pub token_hash: String,
    pub issued_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    /// Rotation chain link to the session this one replaced.
    pub predecessor_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshSession {
    /// Create a new refresh session.
    pub fn new(
        session_id: Uuid,
        principal_id: Uuid,
        token_hash: String,
        expiry_days: i64,
        context: &SessionContext,
        predecessor_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            principal_id,
            token_hash,
            issued_utc: now,
            expiry_utc: now + Duration::days(expiry_days),
            revoked_utc: None,
            revoked_reason: None,
            predecessor_id,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_utc.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    /// Check if session is active (not expired, not revoked).
    pub fn is_active(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }
}

/// Session info for API responses.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub issued_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl From<RefreshSession> for SessionInfo {
    fn from(s: RefreshSession) -> Self {
        Self {
            session_id: s.session_id,
            issued_utc: s.issued_utc,
            expiry_utc: s.expiry_utc,
            ip_address: s.ip_address,
            user_agent: s.user_agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_active() {
        let session = RefreshSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "digest".to_string(),
            7,
            &SessionContext::default(),
            None,
        );
        assert!(session.is_active());
        assert!(!session.is_revoked());
        assert!(session.predecessor_id.is_none());
    }

    #[test]
    fn test_expired_session_is_inactive() {
        let mut session = RefreshSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "digest".to_string(),
            7,
            &SessionContext::default(),
            None,
        );
        session.expiry_utc = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
        assert!(!session.is_active());
    }
}
