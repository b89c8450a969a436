//! Module for leader election and the election state of a node.
//!
//! This module contains the implementation of leader election on top of the
//! coordination service and the per-process election state.

pub mod election;
pub mod state;

pub use election::{ElectionCallback, LeaderElection};
pub use state::{ElectionOutcome, ElectionPhase, ElectionState, NodeRole};
