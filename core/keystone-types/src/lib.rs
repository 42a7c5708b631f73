//! Core type definitions for Keystone.
//!
//! This crate defines the small, dependency-light types shared by every
//! other crate in the workspace:
//! - Node and cluster identifiers (UUID v7)
//! - The wall clock abstraction used for license expiry checks
//!
//! License documents and cluster state live in their own crates.

mod clock;
mod ids;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{ClusterId, NodeId};
