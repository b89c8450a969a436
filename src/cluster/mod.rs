//! Cluster management: leader election and the service registry.

pub mod leader;
pub mod registry;

pub use leader::{ElectionCallback, ElectionOutcome, LeaderElection, NodeRole};
pub use registry::{AddressList, ServiceRegistry};
