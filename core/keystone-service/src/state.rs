//! Observable license state and feature gating.

use crate::service::LicenseService;
use chrono::{DateTime, Utc};
use keystone_consensus::LicensesMetadata;
use keystone_license::{Feature, License, LicenseType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where the cluster sits in the license lifecycle.
///
/// `Unlicensed -> Active -> Expired -> Active'`, with `Removed` reachable
/// from `Active` or `Expired` and left only by a new registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "license", rename_all = "lowercase")]
pub enum ClusterLicenseState {
    /// No license was ever installed.
    Unlicensed,
    /// The license was explicitly removed.
    Removed,
    /// A license is installed and in effect.
    Active(License),
    /// A license is installed but past its expiry date.
    Expired(License),
}

impl ClusterLicenseState {
    /// Classifies stored metadata at instant `now`.
    #[must_use]
    pub fn from_metadata(metadata: &LicensesMetadata, now: DateTime<Utc>) -> Self {
        match metadata {
            LicensesMetadata::Absent => Self::Unlicensed,
            LicensesMetadata::Tombstone => Self::Removed,
            LicensesMetadata::Licensed(license) if license.is_expired_at(now) => {
                Self::Expired(license.clone())
            }
            LicensesMetadata::Licensed(license) => Self::Active(license.clone()),
        }
    }

    /// Returns the license only when it is in effect.
    #[must_use]
    pub fn effective(&self) -> Option<&License> {
        match self {
            Self::Active(license) => Some(license),
            _ => None,
        }
    }
}

/// Answers feature checks from the effective license.
///
/// An expired, removed or missing license enables nothing.
#[derive(Clone)]
pub struct LicenseState {
    service: Arc<LicenseService>,
}

impl LicenseState {
    pub fn new(service: Arc<LicenseService>) -> Self {
        Self { service }
    }

    /// Returns the underlying service.
    pub fn service(&self) -> &Arc<LicenseService> {
        &self.service
    }

    /// Returns the tier of the effective license, if any.
    #[must_use]
    pub fn active_type(&self) -> Option<LicenseType> {
        self.service.get_license().map(|l| l.license_type())
    }

    /// Returns true if the effective license enables `feature`.
    #[must_use]
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.active_type()
            .is_some_and(|license_type| license_type.allows(feature))
    }
}
