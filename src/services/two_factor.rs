use std::sync::Arc;

use chrono::Utc;
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

use crate::models::{Principal, SecondFactorStatus};
use crate::services::error::AuthError;
use crate::store::Store;

/// Time-step tolerance on either side of now, absorbing clock drift.
const TOTP_SKEW_STEPS: u8 = 2;
const TOTP_DIGITS: usize = 6;
const TOTP_STEP_SECONDS: u64 = 30;

/// TOTP secret lifecycle and code verification.
///
/// States: NotConfigured -> PendingActivation -> Enabled -> (disable) ->
/// NotConfigured. Activation happens on the first successful verification
/// with `is_activation` set.
#[derive(Clone)]
pub struct SecondFactorManager {
    store: Arc<dyn Store>,
    issuer: String,
}

impl SecondFactorManager {
    pub fn new(store: Arc<dyn Store>, issuer: String) -> Self {
        Self { store, issuer }
    }

    /// Provision a fresh secret and move to PendingActivation. Fails
    /// Conflict while the second factor is enabled; it must be disabled
    /// with a valid code first.
    pub async fn generate_secret(&self, principal_id: Uuid) -> Result<String, AuthError> {
        let principal = self.load(principal_id).await?;
        if principal.second_factor.is_enabled() {
            return Err(AuthError::Conflict("second factor already enabled"));
        }

        let secret_bytes = Secret::generate_secret()
            .to_bytes()
            .map_err(|e| anyhow::anyhow!("Secret generation error: {e:?}"))?;
        let secret = self.totp(&secret_bytes, &principal.email)?.get_secret_base32();

        self.store
            .set_second_factor(principal_id, Some(&secret), None)
            .await?;
        tracing::info!(principal_id = %principal_id, "Second-factor secret provisioned");
        Ok(secret)
    }

    /// Verify a submitted code against the expected value within the
    /// tolerance window. With `is_activation` set, a successful check in
    /// PendingActivation transitions to Enabled exactly once; verifying an
    /// already-enabled factor with `is_activation` is a no-op success.
    pub async fn verify(
        &self,
        principal_id: Uuid,
        code: &str,
        is_activation: bool,
    ) -> Result<bool, AuthError> {
        let principal = self.load(principal_id).await?;
        let secret = principal
            .second_factor
            .secret()
            .ok_or(AuthError::Unauthorized)?;

        if !self.check_code(secret, &principal.email, code)? {
            return Ok(false);
        }

        if is_activation && principal.second_factor.is_pending() {
            self.store
                .set_second_factor(principal_id, Some(secret), Some(Utc::now()))
                .await?;
            tracing::info!(principal_id = %principal_id, "Second factor enabled");
        }
        Ok(true)
    }

    /// Disable the second factor. Requires a currently valid code; clears
    /// secret and activation timestamp together.
    pub async fn disable(&self, principal_id: Uuid, code: &str) -> Result<(), AuthError> {
        if !self.verify(principal_id, code, false).await? {
            return Err(AuthError::Unauthorized);
        }
        self.store
            .set_second_factor(principal_id, None, None)
            .await?;
        tracing::info!(principal_id = %principal_id, "Second factor disabled");
        Ok(())
    }

    pub async fn status(&self, principal_id: Uuid) -> Result<SecondFactorStatus, AuthError> {
        let principal = self.load(principal_id).await?;
        Ok(SecondFactorStatus::from(&principal.second_factor))
    }

    async fn load(&self, principal_id: Uuid) -> Result<Principal, AuthError> {
        self.store
            .find_principal(principal_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    fn check_code(&self, secret: &str, account: &str, code: &str) -> Result<bool, AuthError> {
        let secret_bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| anyhow::anyhow!("Stored second-factor secret is unreadable: {e:?}"))?;
        let totp = self.totp(&secret_bytes, account)?;
        Ok(totp.check_current(code).unwrap_or(false))
    }

    fn totp(&self, secret_bytes: &[u8], account: &str) -> Result<TOTP, AuthError> {
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW_STEPS,
            TOTP_STEP_SECONDS,
            secret_bytes.to_vec(),
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("TOTP init error: {e}")))
    }
}
