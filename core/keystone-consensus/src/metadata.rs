//! License metadata carried in the replicated cluster state.

use crate::error::{ConsensusError, ConsensusResult};
use keystone_license::License;
use keystone_types::ClusterId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The cluster-wide license slot.
///
/// `Absent` and `Tombstone` are distinct: a node that rejoins after a
/// partition must be able to tell "never installed" from "explicitly
/// removed" and must not bring a removed license back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "license", rename_all = "lowercase")]
pub enum LicensesMetadata {
    /// No license was ever installed.
    #[default]
    Absent,
    /// A license was installed and later removed.
    Tombstone,
    /// The most recently registered license.
    Licensed(License),
}

impl LicensesMetadata {
    /// Returns the stored license, if any. Expiry is not considered.
    #[must_use]
    pub fn license(&self) -> Option<&License> {
        match self {
            Self::Licensed(license) => Some(license),
            Self::Absent | Self::Tombstone => None,
        }
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone)
    }
}

/// A committed, versioned snapshot of the cluster state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    /// Cluster this state belongs to.
    pub cluster_id: ClusterId,
    /// Incremented on every committed change.
    pub version: u64,
    /// The license slot.
    pub licenses: LicensesMetadata,
}

impl ClusterState {
    /// The state a freshly bootstrapped cluster starts from.
    #[must_use]
    pub fn bootstrap(cluster_id: ClusterId) -> Self {
        Self {
            cluster_id,
            version: 0,
            licenses: LicensesMetadata::Absent,
        }
    }

    /// Returns the successor state holding `licenses`.
    #[must_use]
    pub fn next(&self, licenses: LicensesMetadata) -> Self {
        Self {
            cluster_id: self.cluster_id,
            version: self.version + 1,
            licenses,
        }
    }

    /// Serializes the state for persistence.
    pub fn to_bytes(&self) -> ConsensusResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Restores a state written by [`ClusterState::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> ConsensusResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Writes the state to `path`, replacing any previous file.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> ConsensusResult<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| ConsensusError::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| ConsensusError::Storage(format!("rename {}: {e}", path.display())))
    }

    /// Reads a state previously written with [`ClusterState::write_to`].
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub async fn read_from(path: impl AsRef<Path>) -> ConsensusResult<Option<Self>> {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(Self::from_bytes(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConsensusError::Storage(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }
}
