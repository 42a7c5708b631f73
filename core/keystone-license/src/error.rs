//! Error types for license decoding and validation.

use crate::verifier::LicenseStatus;
use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Invalid license document format.
    #[error("invalid license format: {0}")]
    InvalidKeyFormat(String),

    /// Ed25519 signature verification failed.
    #[error("license signature invalid")]
    InvalidSignature,

    /// Payload is malformed or violates a structural rule.
    #[error("invalid license payload: {0}")]
    InvalidPayload(String),

    /// No trusted key is registered for the license format version.
    #[error("no trusted key for license format version {0}")]
    UnknownKeyVersion(u32),

    /// License is authentic but past its expiry date.
    #[error("license expired on {0}")]
    Expired(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Maps the error onto the validation outcome reported to callers.
    #[must_use]
    pub fn status(&self) -> LicenseStatus {
        match self {
            Self::Expired(_) => LicenseStatus::Expired,
            _ => LicenseStatus::Invalid,
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
