//! Signed license documents for Keystone clusters.
//!
//! This crate handles:
//! - The immutable [`License`] value and its canonical byte encoding
//! - The signed wire format used to submit licenses
//! - Validation: structure, Ed25519 signature, then expiry
//!
//! # Wire Format
//!
//! Licenses travel as `base64url(payload).base64url(signature)`. The payload
//! is the canonical JSON encoding of every license field except the
//! signature, and the signature is computed over exactly those bytes.
//!
//! # Validation Order
//!
//! 1. Structure (`expiry_date > issue_date`, `max_nodes > 0`, non-empty ids)
//! 2. Signature against the trusted key for the license format version
//! 3. Expiry against the supplied instant
//!
//! The first failing step decides the [`LicenseStatus`]. Steps 1 and 2 never
//! consult the clock, so a tampered license is rejected regardless of when
//! it is checked.

mod error;
mod license;
mod verifier;

pub use error::{LicenseError, LicenseResult};
pub use license::{Feature, License, LicenseSpec, LicenseType};
pub use verifier::{LicenseStatus, LicenseVerifier, TrustedKeys, CURRENT_FORMAT_VERSION};
