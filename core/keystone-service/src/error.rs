//! Error types for the license service.

use keystone_consensus::ConsensusError;
use thiserror::Error;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors raised by the service layer.
///
/// Registration and removal never return these to callers directly; they
/// are folded into the acknowledgement flag of the response.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The mutation did not commit.
    #[error("commit failed: {0}")]
    Commit(#[from] ConsensusError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
