//! Principal model - authenticated identities.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::second_factor::SecondFactor;

/// Principal entity. Never hard-deleted; `disabled_utc` soft-disables.
#[derive(Debug, Clone)]
pub struct Principal {
    pub principal_id: Uuid,
    pub email: String,
    /// Opaque hash owned by the credential hasher; None for OAuth-only accounts.
    pub password_hash: Option<String>,
    pub display_name: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    pub verified_utc: Option<DateTime<Utc>>,
    pub disabled_utc: Option<DateTime<Utc>>,
    pub second_factor: SecondFactor,
    pub created_utc: DateTime<Utc>,
}

impl Principal {
    /// Create a new password-backed principal.
    pub fn new(email: String, password_hash: String, display_name: Option<String>) -> Self {
        Self {
            principal_id: Uuid::new_v4(),
            email,
            password_hash: Some(password_hash),
            display_name,
            provider: None,
            provider_id: None,
            verified_utc: None,
            disabled_utc: None,
            second_factor: SecondFactor::NotConfigured,
            created_utc: Utc::now(),
        }
    }

    /// Create a principal from an identity-provider handshake.
    /// Provider accounts arrive with a verified address and no local password.
    pub fn from_provider(
        provider: String,
        provider_id: String,
        email: String,
        display_name: Option<String>,
    ) -> Self {
        Self {
            principal_id: Uuid::new_v4(),
            email,
            password_hash: None,
            display_name,
            provider: Some(provider),
            provider_id: Some(provider_id),
            verified_utc: Some(Utc::now()),
            disabled_utc: None,
            second_factor: SecondFactor::NotConfigured,
            created_utc: Utc::now(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled_utc.is_some()
    }

    pub fn is_verified(&self) -> bool {
        self.verified_utc.is_some()
    }

    /// Convert to sanitized response (no secret material).
    pub fn sanitized(&self) -> PrincipalResponse {
        PrincipalResponse {
            principal_id: self.principal_id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            provider: self.provider.clone(),
            verified: self.is_verified(),
            two_factor_enabled: self.second_factor.is_enabled(),
            created_utc: self.created_utc,
        }
    }
}

/// Principal response for API (without credential material).
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalResponse {
    pub principal_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub provider: Option<String>,
    pub verified: bool,
    pub two_factor_enabled: bool,
    pub created_utc: DateTime<Utc>,
}
