use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::{
    revoke_reason, Principal, PrincipalResponse, SecondFactorStatus, SessionContext, SessionInfo,
    TokenPurpose,
};
use crate::services::blacklist::AccessBlacklist;
use crate::services::email::NotificationDispatcher;
use crate::services::error::AuthError;
use crate::services::one_time::OneTimeTokenService;
use crate::services::rotation::RefreshRotator;
use crate::services::sessions::SessionRegistry;
use crate::services::tokens::{AccessClaims, TokenPair, TokenService};
use crate::services::two_factor::SecondFactorManager;
use crate::store::{Store, StoreError};
use crate::utils::{CredentialHasher, Password, PasswordHashString};

/// Row counts removed by a maintenance sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub sessions: u64,
    pub blacklist_entries: u64,
    pub one_time_tokens: u64,
}

/// The exposed authentication contract. Wires the component services over
/// one shared store; callers that need only one concern can hold the
/// component directly.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: TokenService,
    rotator: RefreshRotator,
    sessions: SessionRegistry,
    blacklist: AccessBlacklist,
    two_factor: SecondFactorManager,
    one_time: OneTimeTokenService,
    hasher: Arc<dyn CredentialHasher>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    verification_ttl: Duration,
    reset_ttl: Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        config: &AuthConfig,
        hasher: Arc<dyn CredentialHasher>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let tokens = TokenService::new(&config.tokens);
        Self {
            rotator: RefreshRotator::new(
                Arc::clone(&store),
                tokens.clone(),
                config.revoke_on_reuse,
            ),
            sessions: SessionRegistry::new(Arc::clone(&store)),
            blacklist: AccessBlacklist::new(Arc::clone(&store)),
            two_factor: SecondFactorManager::new(Arc::clone(&store), config.totp_issuer.clone()),
            one_time: OneTimeTokenService::new(Arc::clone(&store)),
            verification_ttl: Duration::hours(config.one_time.verification_ttl_hours),
            reset_ttl: Duration::minutes(config.one_time.reset_ttl_minutes),
            store,
            tokens,
            hasher,
            dispatcher,
        }
    }

    // -- registration and login ---------------------------------------------

    /// Register a password-backed principal and start email verification.
    pub async fn register(
        &self,
        email: &str,
        password: &Password,
        display_name: Option<String>,
    ) -> Result<PrincipalResponse, AuthError> {
        let hash = self.hasher.hash(password)?;
        let principal = Principal::new(email.to_string(), hash.into_string(), display_name);

        match self.store.insert_principal(&principal).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(AuthError::Conflict("email already registered"))
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(principal_id = %principal.principal_id, "Principal registered");

        self.send_verification(&principal).await?;
        Ok(principal.sanitized())
    }

    /// Authenticate with email and password, gated by the second factor when
    /// one is enabled.
    ///
    /// Unknown email, wrong password, missing or wrong TOTP code, and a
    /// disabled account all fail with the same `Unauthorized`.
    pub async fn login(
        &self,
        email: &str,
        password: &Password,
        totp_code: Option<&str>,
        context: &SessionContext,
    ) -> Result<TokenPair, AuthError> {
        let principal = self
            .store
            .find_principal_by_email(email)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let hash = principal
            .password_hash
            .as_deref()
            .map(|h| PasswordHashString::new(h.to_string()))
            // Provider-only accounts have no password to check.
            .ok_or(AuthError::Unauthorized)?;
        if !self.hasher.verify(password, &hash) {
            return Err(AuthError::Unauthorized);
        }
        if principal.is_disabled() {
            return Err(AuthError::Unauthorized);
        }

        if principal.second_factor.is_enabled() {
            let code = totp_code.ok_or(AuthError::Unauthorized)?;
            if !self
                .two_factor
                .verify(principal.principal_id, code, false)
                .await?
            {
                return Err(AuthError::Unauthorized);
            }
        }

        let pair = self.rotator.open_session(&principal, context, None).await?;
        tracing::info!(principal_id = %principal.principal_id, "Login succeeded");

        if let Err(e) = self
            .dispatcher
            .send_login_alert(&principal.email, context)
            .await
        {
            tracing::warn!(error = %e, "Failed to send login alert");
        }
        Ok(pair)
    }

    /// Authenticate via an identity-provider handshake the transport has
    /// already completed. Resolves the (provider, provider_id) pair to an
    /// existing principal or creates one.
    pub async fn oauth_login(
        &self,
        provider: &str,
        provider_id: &str,
        email: &str,
        display_name: Option<String>,
        context: &SessionContext,
    ) -> Result<TokenPair, AuthError> {
        let principal = match self
            .store
            .find_principal_by_provider(provider, provider_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let created = Principal::from_provider(
                    provider.to_string(),
                    provider_id.to_string(),
                    email.to_string(),
                    display_name,
                );
                match self.store.insert_principal(&created).await {
                    Ok(()) => {
                        tracing::info!(
                            principal_id = %created.principal_id,
                            provider = %provider,
                            "Provider principal created"
                        );
                        created
                    }
                    // The address already has a password-backed account.
                    Err(StoreError::Duplicate(_)) => {
                        return Err(AuthError::Conflict("email already registered"))
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if principal.is_disabled() {
            return Err(AuthError::Unauthorized);
        }
        self.rotator.open_session(&principal, context, None).await
    }

    // -- credential verification and rotation -------------------------------

    /// Validate an access credential: signature and expiry first, then the
    /// blacklist.
    pub async fn verify_access(&self, token_value: &str) -> Result<AccessClaims, AuthError> {
        let claims = self.tokens.decode_access(token_value)?;
        if self.blacklist.check(token_value).await? {
            return Err(AuthError::Blacklisted);
        }
        Ok(claims)
    }

    /// Exchange a refresh credential for a fresh pair. Single-use; see
    /// [`RefreshRotator::rotate`].
    pub async fn refresh(
        &self,
        refresh_token: &str,
        context: &SessionContext,
    ) -> Result<TokenPair, AuthError> {
        self.rotator.rotate(refresh_token, context).await
    }

    /// End a session: blacklist the access credential until its natural
    /// expiry and retire the refresh session backing `refresh_token`.
    ///
    /// Tolerant of an already-invalid access credential; an expired or
    /// malformed one has nothing left to blacklist.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AuthError> {
        let session = self
            .store
            .find_session_by_hash(&TokenService::hash(refresh_token))
            .await?
            .ok_or(AuthError::NotFound)?;

        if let Ok(claims) = self.tokens.decode_access(access_token) {
            let expiry = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
            self.blacklist
                .add(access_token, session.principal_id, expiry, revoke_reason::LOGOUT)
                .await?;
        }

        // Already-revoked is fine; logout is idempotent.
        self.store
            .revoke_session_if_active(session.session_id, Utc::now(), revoke_reason::LOGOUT)
            .await?;
        tracing::info!(principal_id = %session.principal_id, "Logged out");
        Ok(())
    }

    // -- session management -------------------------------------------------

    pub async fn list_sessions(&self, principal_id: Uuid) -> Result<Vec<SessionInfo>, AuthError> {
        self.sessions.list(principal_id).await
    }

    pub async fn revoke_session(
        &self,
        principal_id: Uuid,
        session_id: Uuid,
    ) -> Result<(), AuthError> {
        self.sessions.revoke(principal_id, session_id).await
    }

    /// Revoke every session except the one backing the presented refresh
    /// credential.
    pub async fn revoke_other_sessions(
        &self,
        principal_id: Uuid,
        current_refresh_token: &str,
    ) -> Result<u64, AuthError> {
        self.sessions
            .revoke_others(principal_id, current_refresh_token)
            .await
    }

    // -- second factor ------------------------------------------------------

    /// Provision a TOTP secret; returns the base32 value for enrollment.
    pub async fn setup_two_factor(&self, principal_id: Uuid) -> Result<String, AuthError> {
        self.two_factor.generate_secret(principal_id).await
    }

    /// Activate a provisioned secret with a first valid code.
    pub async fn verify_two_factor(&self, principal_id: Uuid, code: &str) -> Result<(), AuthError> {
        if !self.two_factor.verify(principal_id, code, true).await? {
            return Err(AuthError::Unauthorized);
        }
        Ok(())
    }

    pub async fn disable_two_factor(
        &self,
        principal_id: Uuid,
        code: &str,
    ) -> Result<(), AuthError> {
        self.two_factor.disable(principal_id, code).await
    }

    pub async fn two_factor_status(
        &self,
        principal_id: Uuid,
    ) -> Result<SecondFactorStatus, AuthError> {
        self.two_factor.status(principal_id).await
    }

    // -- email verification -------------------------------------------------

    /// Re-send the verification email. Always reports success; an unknown or
    /// already-verified address gets no token.
    pub async fn request_email_verification(&self, email: &str) -> Result<(), AuthError> {
        match self.store.find_principal_by_email(email).await? {
            Some(principal) if !principal.is_verified() && !principal.is_disabled() => {
                self.send_verification(&principal).await
            }
            _ => Ok(()),
        }
    }

    /// Consume a verification token and mark its owner verified.
    pub async fn verify_email(&self, token_value: &str) -> Result<(), AuthError> {
        let token = self
            .one_time
            .verify(TokenPurpose::EmailVerification, token_value)
            .await?;
        self.one_time.consume(token.token_id).await?;
        self.store
            .set_verified(token.principal_id, Utc::now())
            .await?;
        tracing::info!(principal_id = %token.principal_id, "Email verified");
        Ok(())
    }

    // -- password lifecycle -------------------------------------------------

    /// Start a password reset. Always reports success so the caller cannot
    /// probe which addresses exist; only a known, enabled principal gets a
    /// token.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let Some(principal) = self.store.find_principal_by_email(email).await? else {
            return Ok(());
        };
        if principal.is_disabled() {
            return Ok(());
        }

        let token = self
            .one_time
            .issue(
                principal.principal_id,
                TokenPurpose::PasswordReset,
                self.reset_ttl,
            )
            .await?;
        if let Err(e) = self
            .dispatcher
            .send_password_reset_email(&principal.email, &token.token_value)
            .await
        {
            tracing::warn!(error = %e, "Failed to send password reset email");
        }
        Ok(())
    }

    /// Complete a password reset: consume the token, store the new hash, and
    /// sign out every session.
    pub async fn confirm_password_reset(
        &self,
        token_value: &str,
        new_password: &Password,
    ) -> Result<(), AuthError> {
        let token = self
            .one_time
            .verify(TokenPurpose::PasswordReset, token_value)
            .await?;
        self.one_time.consume(token.token_id).await?;

        let hash = self.hasher.hash(new_password)?;
        self.store
            .set_password_hash(token.principal_id, hash.as_str())
            .await?;
        self.sessions
            .revoke_all(token.principal_id, revoke_reason::PASSWORD_RESET)
            .await?;
        tracing::info!(principal_id = %token.principal_id, "Password reset completed");

        self.send_password_change_alert(token.principal_id).await;
        Ok(())
    }

    /// Change the password of an authenticated principal. Requires the
    /// current password and signs out every session.
    pub async fn change_password(
        &self,
        principal_id: Uuid,
        current_password: &Password,
        new_password: &Password,
    ) -> Result<(), AuthError> {
        let principal = self
            .store
            .find_principal(principal_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        let hash = principal
            .password_hash
            .as_deref()
            .map(|h| PasswordHashString::new(h.to_string()))
            .ok_or(AuthError::Unauthorized)?;
        if !self.hasher.verify(current_password, &hash) {
            return Err(AuthError::Unauthorized);
        }

        let new_hash = self.hasher.hash(new_password)?;
        self.store
            .set_password_hash(principal_id, new_hash.as_str())
            .await?;
        self.sessions
            .revoke_all(principal_id, revoke_reason::PASSWORD_CHANGE)
            .await?;
        tracing::info!(principal_id = %principal_id, "Password changed");

        self.send_password_change_alert(principal_id).await;
        Ok(())
    }

    // -- account lifecycle --------------------------------------------------

    /// Soft-disable an account and sign out every session. The row is kept;
    /// nothing is hard-deleted.
    pub async fn disable_account(&self, principal_id: Uuid) -> Result<(), AuthError> {
        if self.store.find_principal(principal_id).await?.is_none() {
            return Err(AuthError::NotFound);
        }
        self.store.set_disabled(principal_id, Utc::now()).await?;
        self.sessions
            .revoke_all(principal_id, revoke_reason::ACCOUNT_DISABLED)
            .await?;
        tracing::info!(principal_id = %principal_id, "Account disabled");
        Ok(())
    }

    // -- maintenance --------------------------------------------------------

    /// Delete expired sessions, blacklist entries, and one-time tokens.
    /// Idempotent and safe to run concurrently with every other operation.
    pub async fn sweep_expired(&self) -> Result<SweepReport, AuthError> {
        Ok(SweepReport {
            sessions: self.sessions.sweep().await?,
            blacklist_entries: self.blacklist.sweep().await?,
            one_time_tokens: self.one_time.sweep().await?,
        })
    }

    // -- internal -----------------------------------------------------------

    async fn send_verification(&self, principal: &Principal) -> Result<(), AuthError> {
        let token = self
            .one_time
            .issue(
                principal.principal_id,
                TokenPurpose::EmailVerification,
                self.verification_ttl,
            )
            .await?;
        if let Err(e) = self
            .dispatcher
            .send_verification_email(&principal.email, &token.token_value)
            .await
        {
            tracing::warn!(error = %e, "Failed to send verification email");
        }
        Ok(())
    }

    async fn send_password_change_alert(&self, principal_id: Uuid) {
        let email = match self.store.find_principal(principal_id).await {
            Ok(Some(principal)) => principal.email,
            _ => return,
        };
        if let Err(e) = self.dispatcher.send_password_change_alert(&email).await {
            tracing::warn!(error = %e, "Failed to send password change alert");
        }
    }
}
