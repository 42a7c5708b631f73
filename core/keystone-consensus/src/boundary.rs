//! The consensus boundary consumed by the license service.
//!
//! Abstracts over whatever replicates cluster state, so the service can run
//! against the in-memory cluster in tests and a real engine in production.

use crate::error::ConsensusResult;
use crate::metadata::{ClusterState, LicensesMetadata};
use async_trait::async_trait;
use keystone_types::NodeId;
use std::sync::Arc;
use std::time::Duration;

/// A function from the authoritative metadata to its replacement.
///
/// Applied at most once, by the sequencer, against the latest committed
/// state. Never applied locally.
pub type Mutation = Box<dyn FnOnce(&LicensesMetadata) -> LicensesMetadata + Send + 'static>;

/// Acknowledgement that a mutation committed on a quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitAck {
    /// State version after the mutation.
    pub version: u64,
    /// False when the mutation produced the state it started from.
    pub changed: bool,
}

/// Atomic, totally ordered mutation of replicated cluster state.
#[async_trait]
pub trait ConsensusBoundary: Send + Sync {
    /// Returns the ID of the node this handle is attached to.
    fn local_node(&self) -> NodeId;

    /// Returns the latest locally applied snapshot.
    ///
    /// Never blocks. May lag the leader, but is always a previously
    /// committed state, never a partial one.
    fn read(&self) -> Arc<ClusterState>;

    /// Returns true if the local node currently holds leadership.
    fn is_leader(&self) -> bool;

    /// Submits a mutation and waits up to `timeout` for it to commit.
    ///
    /// `source` describes the change for logs. On error nothing was applied,
    /// except for [`ConsensusError::Timeout`](crate::ConsensusError::Timeout)
    /// where the outcome is unknown.
    async fn propose(
        &self,
        source: &str,
        mutation: Mutation,
        timeout: Duration,
    ) -> ConsensusResult<CommitAck>;
}
