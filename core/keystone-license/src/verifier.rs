//! License validation: structure, Ed25519 signature, expiry.

use crate::error::{LicenseError, LicenseResult};
use crate::license::License;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The license format version issued today.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// Placeholder Ed25519 verification key for format version 1.
///
/// Nothing signs with its private half. Deployments trust their issuer's key
/// instead (`keystone-node --public-key`).
const LICENSE_PUBLIC_KEY_V1: [u8; 32] = [
    151, 226, 113, 20, 135, 101, 0, 92, 31, 14, 202, 41, 252, 62, 231, 63,
    174, 180, 60, 162, 28, 225, 227, 198, 140, 177, 0, 193, 197, 245, 9, 251,
];

/// Outcome of validating or registering a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// Well-formed, authentic and not yet expired.
    Valid,
    /// Malformed, or the signature does not match the payload.
    Invalid,
    /// Authentic but past its expiry date.
    Expired,
}

impl LicenseStatus {
    /// Returns true only for [`LicenseStatus::Valid`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Verification keys indexed by license format version.
#[derive(Debug, Clone, Default)]
pub struct TrustedKeys {
    keys: HashMap<u32, VerifyingKey>,
}

impl TrustedKeys {
    /// Creates an empty key table. Every license fails against it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table holding the embedded placeholder key.
    pub fn embedded() -> LicenseResult<Self> {
        Self::new().with_key(CURRENT_FORMAT_VERSION, &LICENSE_PUBLIC_KEY_V1)
    }

    /// Adds (or replaces) the verification key for a format version.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid Ed25519 public key.
    pub fn with_key(mut self, version: u32, public_key: &[u8; 32]) -> LicenseResult<Self> {
        let key = VerifyingKey::from_bytes(public_key)
            .map_err(|_| LicenseError::InvalidKeyFormat("invalid public key".to_string()))?;
        self.keys.insert(version, key);
        Ok(self)
    }

    /// Returns the key for a format version, if one is trusted.
    #[must_use]
    pub fn get(&self, version: u32) -> Option<&VerifyingKey> {
        self.keys.get(&version)
    }

    /// Returns the number of trusted versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Validates licenses against a set of trusted keys.
///
/// Stateless apart from the key table; every check is a pure function of
/// the license and, for expiry only, the supplied instant.
#[derive(Debug, Clone)]
pub struct LicenseVerifier {
    keys: TrustedKeys,
}

impl LicenseVerifier {
    /// Creates a verifier trusting `keys`.
    #[must_use]
    pub fn new(keys: TrustedKeys) -> Self {
        Self { keys }
    }

    /// Returns the trusted key table.
    #[must_use]
    pub fn keys(&self) -> &TrustedKeys {
        &self.keys
    }

    /// Runs every check and reports the first failure as a status.
    #[must_use]
    pub fn validate(&self, license: &License, now: DateTime<Utc>) -> LicenseStatus {
        match self.verify(license, now) {
            Ok(()) => LicenseStatus::Valid,
            Err(e) => e.status(),
        }
    }

    /// Runs every check, short-circuiting on the first failure.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing check.
    pub fn verify(&self, license: &License, now: DateTime<Utc>) -> LicenseResult<()> {
        self.verify_structure(license)?;
        self.verify_signature(license)?;
        Self::check_expiry(license, now)
    }

    /// Structural rules that do not need the key or the clock.
    pub fn verify_structure(&self, license: &License) -> LicenseResult<()> {
        let spec = license.spec();
        if spec.uid.trim().is_empty() {
            return Err(LicenseError::InvalidPayload("uid is empty".to_string()));
        }
        if spec.issued_to.trim().is_empty() {
            return Err(LicenseError::InvalidPayload("issued_to is empty".to_string()));
        }
        if spec.issuer.trim().is_empty() {
            return Err(LicenseError::InvalidPayload("issuer is empty".to_string()));
        }
        // Dates are signed at millisecond precision; anything finer is unsigned.
        for (field, date) in [("issue_date", spec.issue_date), ("expiry_date", spec.expiry_date)] {
            if date.timestamp_subsec_nanos() % 1_000_000 != 0 {
                return Err(LicenseError::InvalidPayload(format!(
                    "{field} {date} has sub-millisecond precision"
                )));
            }
        }
        if spec.expiry_date <= spec.issue_date {
            return Err(LicenseError::InvalidPayload(format!(
                "expiry date {} is not after issue date {}",
                spec.expiry_date, spec.issue_date
            )));
        }
        if spec.max_nodes <= 0 {
            return Err(LicenseError::InvalidPayload(format!(
                "max_nodes must be positive, got {}",
                spec.max_nodes
            )));
        }
        Ok(())
    }

    /// Verifies the signature over the canonical payload bytes.
    pub fn verify_signature(&self, license: &License) -> LicenseResult<()> {
        let version = license.spec().version;
        let key = self
            .keys
            .get(version)
            .ok_or(LicenseError::UnknownKeyVersion(version))?;

        let signature = Signature::from_slice(license.signature()).map_err(|_| {
            LicenseError::InvalidKeyFormat("invalid signature length".to_string())
        })?;

        let payload = license.spec().canonical_bytes()?;
        key.verify(&payload, &signature)
            .map_err(|_| LicenseError::InvalidSignature)
    }

    /// Fails with [`LicenseError::Expired`] once `now` reaches the expiry date.
    pub fn check_expiry(license: &License, now: DateTime<Utc>) -> LicenseResult<()> {
        if license.is_expired_at(now) {
            return Err(LicenseError::Expired(license.expiry_date().to_rfc3339()));
        }
        Ok(())
    }
}
