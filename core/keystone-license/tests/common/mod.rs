//! Shared test helpers for license tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signer, SigningKey};
use keystone_license::{License, LicenseSpec, LicenseType, LicenseVerifier, TrustedKeys};

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, [u8; 32]) {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key.to_bytes())
}

/// A verifier trusting the test key for format version 1.
pub fn test_verifier() -> LicenseVerifier {
    let (_, pk) = test_keypair();
    LicenseVerifier::new(TrustedKeys::new().with_key(1, &pk).unwrap())
}

/// Current time truncated to the millisecond precision licenses carry.
pub fn now_millis() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
}

/// Builds an unsigned spec valid from `issued` for `lifetime`.
pub fn spec_at(license_type: LicenseType, issued: DateTime<Utc>, lifetime: Duration) -> LicenseSpec {
    LicenseSpec {
        uid: format!("{}-{}", license_type, issued.timestamp_millis()),
        version: 1,
        license_type,
        issued_to: "customer".to_string(),
        issuer: "keystone".to_string(),
        issue_date: issued,
        expiry_date: issued + lifetime,
        max_nodes: 5,
    }
}

/// Signs a spec with the given key over its canonical bytes.
pub fn sign(signing_key: &SigningKey, spec: LicenseSpec) -> License {
    let payload = spec.canonical_bytes().unwrap();
    let signature = signing_key.sign(&payload);
    License::from_parts(spec, signature.to_bytes().to_vec())
}

/// Creates a license issued now with the given type and lifetime, signed
/// with the test key.
pub fn signed_license(license_type: LicenseType, lifetime: Duration) -> License {
    let (sk, _) = test_keypair();
    sign(&sk, spec_at(license_type, now_millis(), lifetime))
}
