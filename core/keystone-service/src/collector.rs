//! License-gated statistics collection.
//!
//! Collectors only read the license. When the effective license does not
//! enable monitoring they produce nothing instead of failing.

use crate::error::ServiceResult;
use crate::state::LicenseState;
use chrono::{DateTime, Utc};
use keystone_license::{Feature, LicenseType};
use keystone_types::{ClusterId, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Produces monitoring documents for one aspect of the node.
pub trait Collector: Send + Sync {
    /// Document type this collector emits.
    type Doc: Serialize;

    /// Stable collector name for logs.
    fn name(&self) -> &'static str;

    /// Returns false when collection should be skipped this round.
    fn should_collect(&self) -> bool;

    /// Gathers the documents. Only called when `should_collect` is true.
    fn do_collect(&self) -> ServiceResult<Vec<Self::Doc>>;
}

/// Runs a collector, returning no documents if it declines to collect.
pub fn collect<C: Collector>(collector: &C) -> ServiceResult<Vec<C::Doc>> {
    if !collector.should_collect() {
        debug!("collector [{}] skipped", collector.name());
        return Ok(Vec::new());
    }
    let docs = collector.do_collect()?;
    debug!("collector [{}] produced {} documents", collector.name(), docs.len());
    Ok(docs)
}

/// Statistics about the local node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatsDoc {
    pub cluster_id: ClusterId,
    pub node_id: NodeId,
    pub is_leader: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Cluster state version applied on this node.
    pub state_version: u64,
    pub license_type: LicenseType,
}

/// Emits one [`NodeStatsDoc`] per round while monitoring is licensed.
pub struct NodeStatsCollector {
    license_state: LicenseState,
}

impl NodeStatsCollector {
    pub const NAME: &'static str = "node-stats-collector";

    pub fn new(license_state: LicenseState) -> Self {
        Self { license_state }
    }

    /// Returns the gate this collector checks before each round.
    pub fn license_state(&self) -> &LicenseState {
        &self.license_state
    }
}

impl Collector for NodeStatsCollector {
    type Doc = NodeStatsDoc;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn should_collect(&self) -> bool {
        self.license_state.is_enabled(Feature::Monitoring)
    }

    fn do_collect(&self) -> ServiceResult<Vec<NodeStatsDoc>> {
        let service = self.license_state.service();
        // The license may expire between should_collect and here.
        let Some(license) = service.get_license() else {
            return Ok(Vec::new());
        };
        let consensus = service.consensus();
        let state = consensus.read();

        Ok(vec![NodeStatsDoc {
            cluster_id: state.cluster_id,
            node_id: consensus.local_node(),
            is_leader: consensus.is_leader(),
            timestamp: service.clock().now(),
            state_version: state.version,
            license_type: license.license_type(),
        }])
    }
}
