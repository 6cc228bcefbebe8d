//! One-time token model - single-use tokens for out-of-band flows.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One-time token purpose codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }
}

/// One-time token entity. At most one live row exists per
/// (principal, purpose); issuing a replacement deletes the previous row.
#[derive(Debug, Clone, FromRow)]
pub struct OneTimeToken {
    pub token_id: Uuid,
    pub principal_id: Uuid,
    /// Opaque random value handed to the out-of-band channel.
    pub token_value: String,
    pub purpose_code: String,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl OneTimeToken {
    pub fn new(
        principal_id: Uuid,
        token_value: String,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_id: Uuid::new_v4(),
            principal_id,
            token_value,
            purpose_code: purpose.as_str().to_string(),
            expiry_utc: now + ttl,
            created_utc: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }
}
