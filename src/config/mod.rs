use std::env;

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;

/// Top-level configuration, loaded from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub environment: Environment,
    pub tokens: TokenConfig,
    pub one_time: OneTimeTokenConfig,
    pub smtp: SmtpConfig,
    pub database: DatabaseConfig,
    /// Issuer label embedded in TOTP provisioning URIs.
    pub totp_issuer: String,
    /// Cascade-revoke the rotation chain when a retired refresh credential
    /// is presented again.
    pub revoke_on_reuse: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
    /// Optional transport-imposed floor on the encoded access token size.
    /// Policy knob only; None disables padding.
    pub min_access_token_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OneTimeTokenConfig {
    pub verification_ttl_hours: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    /// Base URL used to build verification/reset links.
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str.parse().map_err(|e: String| anyhow!(e))?;
        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            environment,
            tokens: TokenConfig {
                access_token_secret: get_env("ACCESS_TOKEN_SECRET", None, is_prod)?,
                refresh_token_secret: get_env("REFRESH_TOKEN_SECRET", None, is_prod)?,
                access_token_expiry_minutes: parse_env(
                    "ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("15"),
                    is_prod,
                )?,
                refresh_token_expiry_days: parse_env(
                    "REFRESH_TOKEN_EXPIRY_DAYS",
                    Some("7"),
                    is_prod,
                )?,
                min_access_token_bytes: match env::var("MIN_ACCESS_TOKEN_BYTES") {
                    Ok(v) => Some(v.parse()?),
                    Err(_) => None,
                },
            },
            one_time: OneTimeTokenConfig {
                verification_ttl_hours: parse_env("VERIFICATION_TTL_HOURS", Some("24"), is_prod)?,
                reset_ttl_minutes: parse_env("RESET_TTL_MINUTES", Some("60"), is_prod)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod)?,
                port: parse_env("SMTP_PORT", Some("587"), is_prod)?,
                user: get_env("SMTP_USER", None, is_prod)?,
                password: get_env("SMTP_PASSWORD", None, is_prod)?,
                from_email: get_env("SMTP_FROM_EMAIL", None, is_prod)?,
                base_url: get_env("BASE_URL", Some("http://localhost:3000"), is_prod)?,
            },
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?,
            },
            totp_issuer: get_env("TOTP_ISSUER", Some("auth-core"), is_prod)?,
            revoke_on_reuse: parse_env("REVOKE_ON_REUSE", Some("true"), is_prod)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tokens.access_token_secret.len() < 32
            || self.tokens.refresh_token_secret.len() < 32
        {
            bail!("token secrets must be at least 32 bytes");
        }
        // Independent signing domains are the point; one shared secret
        // would collapse them.
        if self.tokens.access_token_secret == self.tokens.refresh_token_secret {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }
        if self.tokens.access_token_expiry_minutes <= 0 {
            bail!("ACCESS_TOKEN_EXPIRY_MINUTES must be positive");
        }
        if self.tokens.refresh_token_expiry_days <= 0 {
            bail!("REFRESH_TOKEN_EXPIRY_DAYS must be positive");
        }
        if self.one_time.verification_ttl_hours <= 0 || self.one_time.reset_ttl_minutes <= 0 {
            bail!("one-time token TTLs must be positive");
        }
        if let Some(min) = self.tokens.min_access_token_bytes {
            if min > 16 * 1024 {
                bail!("MIN_ACCESS_TOKEN_BYTES is unreasonably large");
            }
        }
        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(anyhow!("{} is required in production but not set", key))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(anyhow!("{} is required but not set", key))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, default, is_prod)?;
    raw.parse()
        .map_err(|e: T::Err| anyhow!("{}: {}", key, e))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AuthConfig {
        AuthConfig {
            environment: Environment::Dev,
            tokens: TokenConfig {
                access_token_secret: "a".repeat(64),
                refresh_token_secret: "r".repeat(64),
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
                url: "postgres://localhost/auth".to_string(),
                max_connections: 10,
            },
            totp_issuer: "auth-core".to_string(),
            revoke_on_reuse: true,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_shared_secret_rejected() {
        let mut config = base_config();
        config.tokens.refresh_token_secret = config.tokens.access_token_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = base_config();
        config.tokens.access_token_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_expiry_rejected() {
        let mut config = base_config();
        config.tokens.access_token_expiry_minutes = 0;
        assert!(config.validate().is_err());
    }
}
