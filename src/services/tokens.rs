use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::services::error::AuthError;

/// Issues and validates the two credential classes.
///
/// Access and refresh credentials are signed under independent secrets so a
/// leaked key for one class never validates the other. Verification here is
/// a pure function of the credential and key; the blacklist lookup belongs
/// to the calling path.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_expiry_minutes: i64,
    refresh_expiry_days: i64,
    min_access_token_bytes: Option<usize>,
}

/// Claims for access credentials (short-lived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (principal id)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
    /// Optional padding material for the minimum-size policy. No security
    /// function.
    #[serde(rename = "_p", default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<String>,
}

/// Claims for refresh credentials (long-lived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (principal id)
    pub sub: String,
    /// Session id of the backing refresh session
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// Credential pair returned to the client.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Bounded attempts for the padding grow loop.
const PADDING_ATTEMPTS: usize = 5;

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_expiry_minutes: config.access_token_expiry_minutes,
            refresh_expiry_days: config.refresh_token_expiry_days,
            min_access_token_bytes: config.min_access_token_bytes,
        }
    }

    /// SHA-256 hex digest of a credential, the form stored and compared
    /// everywhere; plaintext credential values never reach the store.
    pub fn hash(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Issue an access credential for a principal.
    pub fn issue_access(&self, principal_id: Uuid, email: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let mut claims = AccessClaims {
            sub: principal_id.to_string(),
            email: email.to_string(),
            exp: (now + Duration::minutes(self.access_expiry_minutes)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            padding: None,
        };

        let header = Header::new(Algorithm::HS256);
        let token = encode(&header, &claims, &self.access_encoding)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;

        let Some(min_bytes) = self.min_access_token_bytes else {
            return Ok(token);
        };
        if token.len() >= min_bytes {
            return Ok(token);
        }

        // Grow the padding claim until the encoded token reaches the floor.
        // Base64 inflation and JWT overhead make the exact size hard to
        // predict, hence the retry loop.
        let mut rng = rand::thread_rng();
        let mut pad_len = min_bytes.saturating_sub(token.len());
        let step = (min_bytes / 10).max(64);
        for _ in 0..PADDING_ATTEMPTS {
            let mut raw = vec![0u8; pad_len];
            rng.fill(raw.as_mut_slice());
            claims.padding = Some(BASE64.encode(&raw));
            let padded = encode(&header, &claims, &self.access_encoding)
                .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;
            if padded.len() >= min_bytes {
                return Ok(padded);
            }
            pad_len += step;
        }
        Err(AuthError::Internal(anyhow::anyhow!(
            "Failed to reach minimum access token size of {} bytes",
            min_bytes
        )))
    }

    /// Issue a refresh credential bound to a session id.
    pub fn issue_refresh(
        &self,
        principal_id: Uuid,
        session_id: Uuid,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: principal_id.to_string(),
            jti: session_id.to_string(),
            exp: (now + Duration::days(self.refresh_expiry_days)).timestamp(),
            iat: now.timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        let token = encode(&header, &claims, &self.refresh_encoding)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh token: {}", e))?;
        Ok(token)
    }

    /// Validate and decode an access credential.
    pub fn decode_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &Self::validation())
            .map_err(map_jwt_error)?;
        Ok(data.claims)
    }

    /// Validate and decode a refresh credential.
    pub fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &Self::validation())
            .map_err(map_jwt_error)?;
        Ok(data.claims)
    }

    /// Access credential expiry in seconds (for client info).
    pub fn access_expiry_seconds(&self) -> i64 {
        self.access_expiry_minutes * 60
    }

    pub fn refresh_expiry_days(&self) -> i64 {
        self.refresh_expiry_days
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Malformed,
    }
}
