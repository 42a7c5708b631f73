//! Cluster-wide license service for Keystone.
//!
//! Ties license validation to the replicated cluster state:
//!
//! - **register**: validate, then replace the stored license through consensus
//! - **remove**: replace the stored license with the tombstone
//! - **get_license**: read the local snapshot and drop expired licenses
//!
//! The service keeps no state of its own. Everything it returns comes from
//! the snapshot the [`ConsensusBoundary`](keystone_consensus::ConsensusBoundary)
//! last applied on this node, and every change goes through a proposal.
//!
//! # Consumers
//!
//! - [`LicenseState`] answers "is feature X enabled" for the rest of the node
//! - [`Collector`]s skip their work when the license does not cover monitoring

mod collector;
mod config;
mod error;
mod service;
mod state;

pub use collector::{collect, Collector, NodeStatsCollector, NodeStatsDoc};
pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use service::{DeleteLicenseResponse, LicenseService, PutLicenseResponse};
pub use state::{ClusterLicenseState, LicenseState};
