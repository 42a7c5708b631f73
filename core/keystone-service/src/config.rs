//! License service configuration.

use crate::error::{ServiceError, ServiceResult};
use std::time::Duration;

/// Configuration for the license service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How long register and remove wait for a commit acknowledgement.
    pub ack_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(30_000),
        }
    }
}

impl ServiceConfig {
    /// Returns a copy with a different acknowledgement timeout.
    #[must_use]
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.ack_timeout.is_zero() {
            return Err(ServiceError::Config(
                "ack_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
