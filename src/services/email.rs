use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::models::SessionContext;

/// Outbound notifications. All sends are fire-and-forget from the caller's
/// point of view: a dispatch failure is logged and never fails the core
/// operation that triggered it.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_verification_email(&self, to_email: &str, token: &str)
        -> Result<(), anyhow::Error>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        token: &str,
    ) -> Result<(), anyhow::Error>;

    async fn send_login_alert(
        &self,
        to_email: &str,
        context: &SessionContext,
    ) -> Result<(), anyhow::Error>;

    async fn send_password_change_alert(&self, to_email: &str) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct SmtpDispatcher {
    mailer: SmtpTransport,
    from_email: String,
    base_url: String,
}

impl SmtpDispatcher {
    pub fn new(config: &SmtpConfig) -> Result<Self, anyhow::Error> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "SMTP dispatcher initialized");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
            base_url: config.base_url.clone(),
        })
    }

    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        body: String,
    ) -> Result<(), anyhow::Error> {
        let email = Message::builder()
            .from(self.from_email.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        // Blocking transport; keep it off the async runtime.
        let mailer = self.mailer.clone();
        tokio::task::spawn_blocking(move || mailer.send(&email)).await??;

        tracing::info!(to = %to_email, subject = %subject, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for SmtpDispatcher {
    async fn send_verification_email(
        &self,
        to_email: &str,
        token: &str,
    ) -> Result<(), anyhow::Error> {
        let link = format!("{}/auth/verify?token={}", self.base_url, token);
        let body = format!(
            "Welcome! Please verify your email address by visiting:\n\n{}\n\n\
             This link expires in 24 hours. If you didn't register, ignore this email.",
            link
        );
        self.send(to_email, "Verify your email address", body).await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        token: &str,
    ) -> Result<(), anyhow::Error> {
        let link = format!("{}/auth/password-reset/confirm?token={}", self.base_url, token);
        let body = format!(
            "We received a request to reset your password. Visit:\n\n{}\n\n\
             This link expires in 1 hour. If you didn't request this, ignore this email.",
            link
        );
        self.send(to_email, "Reset your password", body).await
    }

    async fn send_login_alert(
        &self,
        to_email: &str,
        context: &SessionContext,
    ) -> Result<(), anyhow::Error> {
        let body = format!(
            "A new login to your account just occurred.\n\nAddress: {}\nDevice: {}\n\n\
             If this wasn't you, revoke your sessions and change your password.",
            context.ip_address.as_deref().unwrap_or("unknown"),
            context.user_agent.as_deref().unwrap_or("unknown"),
        );
        self.send(to_email, "New login to your account", body).await
    }

    async fn send_password_change_alert(&self, to_email: &str) -> Result<(), anyhow::Error> {
        let body = "Your password was just changed and all sessions were signed out.\n\n\
                    If this wasn't you, reset your password immediately."
            .to_string();
        self.send(to_email, "Your password was changed", body).await
    }
}

/// Dispatch record kept by [`MockDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMail {
    Verification { to: String, token: String },
    PasswordReset { to: String, token: String },
    LoginAlert { to: String },
    PasswordChangeAlert { to: String },
}

/// Recording dispatcher for tests.
#[derive(Default)]
pub struct MockDispatcher {
    pub sent: std::sync::Mutex<Vec<SentMail>>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_mail(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, mail: SentMail) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(mail);
    }
}

#[async_trait]
impl NotificationDispatcher for MockDispatcher {
    async fn send_verification_email(
        &self,
        to_email: &str,
        token: &str,
    ) -> Result<(), anyhow::Error> {
        self.record(SentMail::Verification {
            to: to_email.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        token: &str,
    ) -> Result<(), anyhow::Error> {
        self.record(SentMail::PasswordReset {
            to: to_email.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }

    async fn send_login_alert(
        &self,
        to_email: &str,
        _context: &SessionContext,
    ) -> Result<(), anyhow::Error> {
        self.record(SentMail::LoginAlert {
            to: to_email.to_string(),
        });
        Ok(())
    }

    async fn send_password_change_alert(&self, to_email: &str) -> Result<(), anyhow::Error> {
        self.record(SentMail::PasswordChangeAlert {
            to: to_email.to_string(),
        });
        Ok(())
    }
}
