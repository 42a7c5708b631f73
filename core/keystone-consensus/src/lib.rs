//! Replicated license metadata and the consensus boundary.
//!
//! The cluster agrees on a single [`ClusterState`] that carries the license
//! metadata. Everything that changes it goes through
//! [`ConsensusBoundary::propose`], which applies a mutation to the
//! authoritative state exactly once, replicates the result and reports
//! success only after a quorum has applied it.
//!
//! # Components
//!
//! - **Metadata**: [`LicensesMetadata`], the absent / tombstone / licensed
//!   tri-state, and the versioned [`ClusterState`] wrapping it
//! - **Boundary**: the narrow [`ConsensusBoundary`] trait consumed by the
//!   license service
//! - **Memory**: [`InMemoryCluster`], a multi-node replicated cluster in one
//!   process with a single sequencer, partitions and leader changes
//!
//! # Example
//!
//! ```
//! # #[tokio::main]
//! # async fn main() {
//! use keystone_consensus::{ClusterConfig, ConsensusBoundary, InMemoryCluster, LicensesMetadata};
//!
//! let cluster = InMemoryCluster::start(ClusterConfig::default());
//! let node = cluster.node(0).unwrap();
//! assert_eq!(node.read().licenses, LicensesMetadata::Absent);
//! # }
//! ```

mod boundary;
mod error;
mod memory;
mod metadata;

pub use boundary::{CommitAck, ConsensusBoundary, Mutation};
pub use error::{ConsensusError, ConsensusResult};
pub use memory::{ClusterConfig, InMemoryCluster, NodeHandle};
pub use metadata::{ClusterState, LicensesMetadata};
