//! License registration, removal and lookup.

use crate::config::ServiceConfig;
use crate::error::ServiceResult;
use crate::state::ClusterLicenseState;
use chrono::{DateTime, Utc};
use keystone_consensus::{CommitAck, ConsensusBoundary, LicensesMetadata, Mutation};
use keystone_license::{License, LicenseStatus, LicenseVerifier};
use keystone_types::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutLicenseResponse {
    /// Validation outcome.
    pub status: LicenseStatus,
    /// True once the license committed cluster-wide. Always false unless
    /// `status` is valid.
    pub acknowledged: bool,
}

/// Outcome of a removal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLicenseResponse {
    /// True once the tombstone committed cluster-wide.
    pub acknowledged: bool,
}

/// Coordinates license validation with the replicated cluster state.
///
/// Holds no license state itself. Reads come from the local snapshot of the
/// consensus boundary; writes are unconditional overwrites proposed through
/// it. Non-acknowledgement means "unknown": the change may or may not have
/// landed, so callers should retry or re-check with [`get_license`].
///
/// [`get_license`]: LicenseService::get_license
pub struct LicenseService {
    consensus: Arc<dyn ConsensusBoundary>,
    verifier: LicenseVerifier,
    clock: Arc<dyn Clock>,
    config: ServiceConfig,
}

impl LicenseService {
    /// Creates a service that reads the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`](crate::ServiceError::Config) if `config` fails validation.
    pub fn new(
        consensus: Arc<dyn ConsensusBoundary>,
        verifier: LicenseVerifier,
        config: ServiceConfig,
    ) -> ServiceResult<Self> {
        Self::with_clock(consensus, verifier, Arc::new(SystemClock), config)
    }

    /// Creates a service with a custom clock.
    pub fn with_clock(
        consensus: Arc<dyn ConsensusBoundary>,
        verifier: LicenseVerifier,
        clock: Arc<dyn Clock>,
        config: ServiceConfig,
    ) -> ServiceResult<Self> {
        config.validate()?;
        Ok(Self {
            consensus,
            verifier,
            clock,
            config,
        })
    }

    /// Returns the consensus boundary this service writes through.
    pub fn consensus(&self) -> &Arc<dyn ConsensusBoundary> {
        &self.consensus
    }

    /// Returns the clock used for expiry checks.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Validates `license` and, if valid, makes it the cluster license.
    ///
    /// Invalid and expired licenses are rejected before anything is
    /// proposed. A valid license replaces whatever is stored, regardless of
    /// tier or remaining lifetime of the previous one.
    pub async fn register(&self, license: License) -> PutLicenseResponse {
        let fingerprint = license.fingerprint();
        let status = self.verifier.validate(&license, self.clock.now());
        if !status.is_valid() {
            warn!(
                "Rejected {} license {} ({}): {:?}",
                license.license_type(),
                license.uid(),
                fingerprint,
                status
            );
            return PutLicenseResponse {
                status,
                acknowledged: false,
            };
        }

        info!(
            "Registering {} license {} ({}) issued to {}",
            license.license_type(),
            license.uid(),
            fingerprint,
            license.issued_to()
        );
        let source = format!("register license [{}]", license.uid());
        let mutation: Mutation =
            Box::new(move |_: &LicensesMetadata| LicensesMetadata::Licensed(license));

        let acknowledged = self.commit(&source, mutation).await.is_ok();
        PutLicenseResponse {
            status,
            acknowledged,
        }
    }

    /// Decodes a signed license document and registers it.
    ///
    /// A document that cannot be decoded is reported as invalid.
    pub async fn register_license_bytes(&self, document: &str) -> PutLicenseResponse {
        match License::decode(document) {
            Ok(license) => self.register(license).await,
            Err(e) => {
                warn!("Rejected undecodable license document: {}", e);
                PutLicenseResponse {
                    status: e.status(),
                    acknowledged: false,
                }
            }
        }
    }

    /// Replaces the cluster license with the tombstone.
    ///
    /// Always permitted. Removing when already removed acknowledges without
    /// changing the state.
    pub async fn remove(&self) -> DeleteLicenseResponse {
        info!("Removing cluster license");
        let mutation: Mutation = Box::new(|_: &LicensesMetadata| LicensesMetadata::Tombstone);
        let acknowledged = self.commit("delete license", mutation).await.is_ok();
        DeleteLicenseResponse { acknowledged }
    }

    async fn commit(&self, source: &str, mutation: Mutation) -> ServiceResult<CommitAck> {
        match self
            .consensus
            .propose(source, mutation, self.config.ack_timeout)
            .await
        {
            Ok(ack) => {
                debug!(
                    "[{}] acknowledged at version {} (changed: {})",
                    source, ack.version, ack.changed
                );
                Ok(ack)
            }
            Err(e) => {
                warn!("[{}] not acknowledged: {}", source, e);
                Err(e.into())
            }
        }
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Returns the effective license: the stored license unless it is
    /// absent, removed or expired.
    ///
    /// Reads only the local snapshot, so it never waits on consensus and may
    /// briefly lag the leader.
    #[must_use]
    pub fn get_license(&self) -> Option<License> {
        let state = self.consensus.read();
        Self::effective_license(&state.licenses, self.clock.now()).cloned()
    }

    /// Computes the effective license from an explicit snapshot.
    ///
    /// Only the expiry is rechecked; the signature was verified when the
    /// license was registered.
    #[must_use]
    pub fn effective_license(metadata: &LicensesMetadata, now: DateTime<Utc>) -> Option<&License> {
        metadata
            .license()
            .filter(|license| !license.is_expired_at(now))
    }

    /// Returns the license state machine position on this node.
    #[must_use]
    pub fn license_state(&self) -> ClusterLicenseState {
        let state = self.consensus.read();
        ClusterLicenseState::from_metadata(&state.licenses, self.clock.now())
    }

    /// Returns the raw metadata from the local snapshot.
    #[must_use]
    pub fn metadata(&self) -> LicensesMetadata {
        self.consensus.read().licenses.clone()
    }
}
