//! Second-factor state - TOTP secret lifecycle.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Second-factor lifecycle for a principal.
///
/// Modeled as one enum rather than two nullable columns so the illegal
/// combination (enabled without a secret) cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SecondFactor {
    #[default]
    NotConfigured,
    PendingActivation {
        secret: String,
    },
    Enabled {
        secret: String,
        enabled_utc: DateTime<Utc>,
    },
}

impl SecondFactor {
    /// Base32 TOTP secret, if one has been provisioned.
    pub fn secret(&self) -> Option<&str> {
        match self {
            SecondFactor::NotConfigured => None,
            SecondFactor::PendingActivation { secret } => Some(secret),
            SecondFactor::Enabled { secret, .. } => Some(secret),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, SecondFactor::Enabled { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SecondFactor::PendingActivation { .. })
    }

    /// Reassemble from the stored column pair. An enabled timestamp without
    /// a secret is not a reachable write; it decodes as NotConfigured.
    pub fn from_columns(secret: Option<String>, enabled_utc: Option<DateTime<Utc>>) -> Self {
        match (secret, enabled_utc) {
            (Some(secret), Some(enabled_utc)) => SecondFactor::Enabled {
                secret,
                enabled_utc,
            },
            (Some(secret), None) => SecondFactor::PendingActivation { secret },
            (None, _) => SecondFactor::NotConfigured,
        }
    }

    /// Split into the stored column pair.
    pub fn to_columns(&self) -> (Option<&str>, Option<DateTime<Utc>>) {
        match self {
            SecondFactor::NotConfigured => (None, None),
            SecondFactor::PendingActivation { secret } => (Some(secret), None),
            SecondFactor::Enabled {
                secret,
                enabled_utc,
            } => (Some(secret), Some(*enabled_utc)),
        }
    }
}

/// Second-factor status for API responses.
#[derive(Debug, Serialize)]
pub struct SecondFactorStatus {
    pub enabled: bool,
    pub enabled_utc: Option<DateTime<Utc>>,
}

impl From<&SecondFactor> for SecondFactorStatus {
    fn from(s: &SecondFactor) -> Self {
        match s {
            SecondFactor::Enabled { enabled_utc, .. } => Self {
                enabled: true,
                enabled_utc: Some(*enabled_utc),
            },
            _ => Self {
                enabled: false,
                enabled_utc: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_round_trip() {
        let enabled = SecondFactor::Enabled {
            secret: "JBSWY3DPEHPK3PXP".to_string(),
            enabled_utc: Utc::now(),
        };
        let (secret, ts) = enabled.to_columns();
        assert_eq!(
            SecondFactor::from_columns(secret.map(String::from), ts),
            enabled
        );
    }

    #[test]
    fn test_illegal_column_pair_decodes_as_not_configured() {
        let state = SecondFactor::from_columns(None, Some(Utc::now()));
        assert_eq!(state, SecondFactor::NotConfigured);
        assert!(state.secret().is_none());
    }
}
