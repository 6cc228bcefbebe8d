//! Shared harness for the integration tests: an `AuthService` over the
//! in-memory store with a recording notification dispatcher.

#![allow(dead_code)]

use std::sync::Arc;

use auth_core::config::{
    AuthConfig, DatabaseConfig, Environment, OneTimeTokenConfig, SmtpConfig, TokenConfig,
};
use auth_core::models::{PrincipalResponse, SessionContext};
use auth_core::services::{AuthService, MockDispatcher, SentMail, TokenPair};
use auth_core::store::{MemoryStore, Store};
use auth_core::utils::{Argon2Hasher, Password};

pub fn test_config() -> AuthConfig {
    AuthConfig {
        environment: Environment::Dev,
        tokens: TokenConfig {
            access_token_secret: "access-domain-test-secret-0123456789abcdef".to_string(),
            refresh_token_secret: "refresh-domain-test-secret-0123456789abcdef".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
            min_access_token_bytes: None,
        },
        one_time: OneTimeTokenConfig {
            verification_ttl_hours: 24,
            reset_ttl_minutes: 60,
        },
        smtp: SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            user: "mailer".to_string(),
            password: "secret".to_string(),
            from_email: "noreply@example.com".to_string(),
            base_url: "http://localhost:3000".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://localhost/auth_test".to_string(),
            max_connections: 5,
        },
        totp_issuer: "auth-core-tests".to_string(),
        revoke_on_reuse: true,
    }
}

pub struct TestHarness {
    pub auth: AuthService,
    pub store: Arc<MemoryStore>,
    pub dispatcher: Arc<MockDispatcher>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .try_init();

        let store = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(MockDispatcher::new());
        let auth = AuthService::new(
            Arc::clone(&store) as Arc<dyn Store>,
            &config,
            Arc::new(Argon2Hasher),
            Arc::clone(&dispatcher) as Arc<dyn auth_core::services::NotificationDispatcher>,
        );
        Self {
            auth,
            store,
            dispatcher,
        }
    }

    /// Register a principal and complete email verification via the token
    /// captured by the mock dispatcher.
    pub async fn register_verified(&self, email: &str, password: &str) -> PrincipalResponse {
        let response = self
            .auth
            .register(email, &pw(password), None)
            .await
            .expect("registration failed");
        let token = self
            .last_verification_token()
            .expect("no verification email recorded");
        self.auth
            .verify_email(&token)
            .await
            .expect("email verification failed");
        response
    }

    /// Register, verify, and log in; returns the principal and a live pair.
    pub async fn login_fixture(&self, email: &str, password: &str) -> (PrincipalResponse, TokenPair) {
        let principal = self.register_verified(email, password).await;
        let pair = self
            .auth
            .login(email, &pw(password), None, &context())
            .await
            .expect("login failed");
        (principal, pair)
    }

    pub fn last_verification_token(&self) -> Option<String> {
        self.dispatcher.sent_mail().iter().rev().find_map(|m| match m {
            SentMail::Verification { token, .. } => Some(token.clone()),
            _ => None,
        })
    }

    pub fn last_reset_token(&self) -> Option<String> {
        self.dispatcher.sent_mail().iter().rev().find_map(|m| match m {
            SentMail::PasswordReset { token, .. } => Some(token.clone()),
            _ => None,
        })
    }
}

pub fn pw(value: &str) -> Password {
    Password::new(value.to_string())
}

pub fn context() -> SessionContext {
    SessionContext {
        ip_address: Some("127.0.0.1".to_string()),
        user_agent: Some("integration-tests".to_string()),
    }
}
