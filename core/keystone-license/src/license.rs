//! The license document and its encodings.
//!
//! A [`License`] is a [`LicenseSpec`] plus the signature issued over the
//! spec's canonical bytes. Neither part can be changed after construction;
//! deriving a modified license means building a new value, whose payload no
//! longer matches the original signature.

use crate::error::{LicenseError, LicenseResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// The license tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    /// Time-limited evaluation with every feature enabled.
    Trial,
    /// Free tier.
    Basic,
    /// Standard subscription.
    Standard,
    /// Silver subscription, feature-equivalent to standard.
    Silver,
    /// Gold subscription.
    Gold,
    /// Platinum subscription.
    Platinum,
}

impl LicenseType {
    /// Returns the lowercase name used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }

    /// Returns true if a license of this tier enables `feature`.
    #[must_use]
    pub fn allows(&self, feature: Feature) -> bool {
        match self {
            Self::Trial | Self::Platinum => true,
            Self::Gold => !matches!(feature, Feature::Graph),
            Self::Standard | Self::Silver => matches!(feature, Feature::Monitoring | Feature::Security),
            Self::Basic => matches!(feature, Feature::Monitoring),
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Premium features gated by the effective license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// Cluster statistics collection.
    Monitoring,
    /// Authentication and access control.
    Security,
    /// Scheduled alerting.
    Watcher,
    /// Relationship exploration.
    Graph,
}

/// Every signature-covered field of a license.
///
/// Field order is part of the canonical encoding; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSpec {
    /// Unique license identifier.
    pub uid: String,
    /// Format version, selects the trusted verification key.
    pub version: u32,
    /// License tier.
    #[serde(rename = "type")]
    pub license_type: LicenseType,
    /// Licensee.
    pub issued_to: String,
    /// Issuing authority.
    pub issuer: String,
    /// Start of validity.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub issue_date: DateTime<Utc>,
    /// End of validity (exclusive).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expiry_date: DateTime<Utc>,
    /// Maximum number of nodes the license covers.
    pub max_nodes: i32,
}

impl LicenseSpec {
    /// Returns the canonical byte encoding covered by the signature.
    pub fn canonical_bytes(&self) -> LicenseResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// An immutable, signed license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    #[serde(flatten)]
    spec: LicenseSpec,
    #[serde(
        serialize_with = "serialize_signature",
        deserialize_with = "deserialize_signature"
    )]
    signature: Vec<u8>,
}

impl License {
    /// Pairs a spec with a signature. No verification happens here.
    #[must_use]
    pub fn from_parts(spec: LicenseSpec, signature: Vec<u8>) -> Self {
        Self { spec, signature }
    }

    /// Decodes the signed wire format `base64url(payload).base64url(signature)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not two base64url parts or the
    /// payload is not a complete license spec. The signature is not checked.
    pub fn decode(document: &str) -> LicenseResult<Self> {
        let document = document.trim();

        let Some((payload_b64, signature_b64)) = document.split_once('.') else {
            return Err(LicenseError::InvalidKeyFormat(
                "license must have exactly two parts separated by a dot".to_string(),
            ));
        };
        if signature_b64.contains('.') {
            return Err(LicenseError::InvalidKeyFormat(
                "license must have exactly two parts separated by a dot".to_string(),
            ));
        }

        let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
            LicenseError::InvalidKeyFormat(format!("invalid signature base64: {e}"))
        })?;

        let payload_json = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|e| {
            LicenseError::InvalidKeyFormat(format!("invalid payload base64: {e}"))
        })?;

        let spec: LicenseSpec = serde_json::from_slice(&payload_json)
            .map_err(|e| LicenseError::InvalidPayload(format!("invalid payload JSON: {e}")))?;

        Ok(Self { spec, signature })
    }

    /// Encodes the license in the signed wire format.
    pub fn encode(&self) -> LicenseResult<String> {
        let payload = self.spec.canonical_bytes()?;
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(&self.signature)
        ))
    }

    /// Returns the signature-covered fields.
    #[must_use]
    pub fn spec(&self) -> &LicenseSpec {
        &self.spec
    }

    /// Returns the raw signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.spec.uid
    }

    #[must_use]
    pub fn license_type(&self) -> LicenseType {
        self.spec.license_type
    }

    #[must_use]
    pub fn issued_to(&self) -> &str {
        &self.spec.issued_to
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.spec.issuer
    }

    #[must_use]
    pub fn issue_date(&self) -> DateTime<Utc> {
        self.spec.issue_date
    }

    #[must_use]
    pub fn expiry_date(&self) -> DateTime<Utc> {
        self.spec.expiry_date
    }

    #[must_use]
    pub fn max_nodes(&self) -> i32 {
        self.spec.max_nodes
    }

    /// Returns true once `now` has reached the expiry date.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.spec.expiry_date
    }

    /// Short, stable identifier for log lines.
    ///
    /// Hashes the payload and signature together, so two licenses with the
    /// same uid but different contents print differently.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.spec.uid.as_bytes());
        if let Ok(payload) = self.spec.canonical_bytes() {
            hasher.update(&payload);
        }
        hasher.update(&self.signature);
        let hash = hasher.finalize();
        URL_SAFE_NO_PAD.encode(&hash[..12])
    }
}

fn serialize_signature<S: Serializer>(signature: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&URL_SAFE_NO_PAD.encode(signature))
}

fn deserialize_signature<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(serde::de::Error::custom)
}
