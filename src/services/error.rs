use thiserror::Error;

use crate::store::StoreError;

/// Closed error taxonomy. Callers branch on the variant, never on message
/// text.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential fails structural or signature checks.
    #[error("malformed credential")]
    Malformed,

    /// Credential or token past its expiry.
    #[error("credential expired")]
    Expired,

    /// Refresh session already retired; on a rotation attempt this is the
    /// reuse signal.
    #[error("credential revoked")]
    Revoked,

    /// Access credential explicitly denylisted.
    #[error("credential blacklisted")]
    Blacklisted,

    /// Absent row. Also used where ownership must not be distinguished from
    /// absence.
    #[error("not found")]
    NotFound,

    /// Failed credential, ownership, or second-factor check.
    #[error("unauthorized")]
    Unauthorized,

    /// Duplicate registration, or the losing side of a race.
    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Collapse verification failures into one caller-facing message so
    /// tampered, expired, and blacklisted credentials are indistinguishable.
    pub fn opaque_message(&self) -> &'static str {
        match self {
            AuthError::Malformed
            | AuthError::Expired
            | AuthError::Revoked
            | AuthError::Blacklisted
            | AuthError::NotFound => "invalid or expired credential",
            AuthError::Unauthorized => "unauthorized",
            AuthError::Conflict(_) => "conflict",
            AuthError::Store(_) | AuthError::Internal(_) => "internal error",
        }
    }
}
