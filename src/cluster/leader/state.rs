//! Module for the election state of a node.
//!
//! The `NodeRole` enum represents the role a node currently holds in the
//! election, while `ElectionPhase` tracks where the election protocol itself is.
//! Both live in a single `ElectionState` record that only the election protocol
//! mutates.

use std::fmt;

/// The role a node holds in the current election round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeRole {
    /// The node has no identity in any live round.
    #[default]
    Unset,
    /// The node has volunteered but has not evaluated the round yet.
    Pending,
    /// The node holds the smallest live identity.
    Leader,
    /// The node is watching its predecessor.
    Follower,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Unset => write!(f, "Unset"),
            NodeRole::Pending => write!(f, "Pending"),
            NodeRole::Leader => write!(f, "Leader"),
            NodeRole::Follower => write!(f, "Follower"),
        }
    }
}

/// Where the election protocol is for this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElectionPhase {
    #[default]
    Idle,
    Volunteered,
    Watching,
    Leader,
}

impl fmt::Display for ElectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElectionPhase::Idle => write!(f, "Idle"),
            ElectionPhase::Volunteered => write!(f, "Volunteered"),
            ElectionPhase::Watching => write!(f, "Watching"),
            ElectionPhase::Leader => write!(f, "Leader"),
        }
    }
}

/// The result of evaluating an election round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionOutcome {
    Leader,
    Follower,
}

impl fmt::Display for ElectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElectionOutcome::Leader => write!(f, "Leader"),
            ElectionOutcome::Follower => write!(f, "Follower"),
        }
    }
}

/// Per-process election record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionState {
    /// Name of this node's identity under the election namespace.
    pub identity: Option<String>,
    pub role: NodeRole,
    pub phase: ElectionPhase,
    /// Identity whose deletion this node is waiting for.
    pub watched_predecessor: Option<String>,
    /// Incremented on every successful volunteer.
    pub round: u64,
    /// Outcome whose callback already ran in this round.
    pub notified: Option<ElectionOutcome>,
}

impl ElectionState {
    /// Invalidates the current round. The round counter is kept.
    pub fn reset(&mut self) {
        self.identity = None;
        self.role = NodeRole::Unset;
        self.phase = ElectionPhase::Idle;
        self.watched_predecessor = None;
        self.notified = None;
    }

    pub fn is_leader(&self) -> bool {
        self.role == NodeRole::Leader
    }
}
