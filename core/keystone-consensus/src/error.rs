//! Error types for the consensus layer.

use keystone_types::NodeId;
use thiserror::Error;

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// Reasons a proposed mutation did not commit, or a topology change failed.
///
/// None of these are fatal. A failed proposal left no trace in any node's
/// state; a timed-out one may still commit later.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// No node currently holds leadership.
    #[error("no elected leader")]
    NoLeader,

    /// Too few nodes are reachable from the leader to commit.
    #[error("quorum lost: {available} of {required} required nodes reachable")]
    QuorumLost { available: usize, required: usize },

    /// The acknowledgement did not arrive in time. The outcome is unknown.
    #[error("timed out waiting for commit acknowledgement")]
    Timeout,

    /// The node is cut off from the rest of the cluster.
    #[error("node {0} is partitioned from the cluster")]
    Partitioned(NodeId),

    /// The node is not a member of this cluster.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// The sequencer has shut down.
    #[error("channel closed")]
    ChannelClosed,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}
