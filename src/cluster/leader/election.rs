//! Module for leader election.
//!
//! The `LeaderElection` struct volunteers a sequential ephemeral identity under
//! the election namespace and decides leadership by identity ordering: the live
//! identity with the smallest sequence suffix leads. Every other node watches
//! only its immediate predecessor, so the departure of one node wakes at most
//! one successor.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use waypoint::cluster::leader::{ElectionCallback, ElectionOutcome, LeaderElection};
//! use waypoint::coordination::MemoryEnsemble;
//!
//! struct Quiet;
//! impl ElectionCallback for Quiet {
//!     fn on_elected_leader(&self) {}
//!     fn on_worker(&self) {}
//! }
//!
//! let ensemble = MemoryEnsemble::new();
//! let (session, _events) = ensemble.connect();
//! let election = LeaderElection::new(Arc::new(session), Arc::new(Quiet));
//!
//! election.volunteer().unwrap();
//! assert_eq!(election.evaluate().unwrap(), ElectionOutcome::Leader);
//! assert!(election.is_leader());
//! ```

use crate::cluster::leader::state::{ElectionOutcome, ElectionPhase, ElectionState, NodeRole};
use crate::coordination::{
    CoordinationError, CoordinationResult, CoordinationSession, ELECTION_NAMESPACE, EventKind,
    WatchedEvent, child_path, node_name, sort_by_sequence,
};
use crate::metrics::COORDINATION_ERROR_COUNTER;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Default bound on list/predecessor/watch attempts per evaluation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

const IDENTITY_PREFIX: &str = "c_";

/// Callback invoked once per election round with the outcome.
///
/// Implementations run on the event-handling path and must not block.
pub trait ElectionCallback: Send + Sync {
    fn on_elected_leader(&self);

    fn on_worker(&self);
}

impl ElectionOutcome {
    /// Invokes the callback method matching this outcome.
    pub fn dispatch(self, callback: &dyn ElectionCallback) {
        match self {
            ElectionOutcome::Leader => callback.on_elected_leader(),
            ElectionOutcome::Follower => callback.on_worker(),
        }
    }
}

/// Manages this process's participation in the election.
pub struct LeaderElection {
    session: Arc<dyn CoordinationSession>,
    namespace: String,
    max_attempts: u32,
    state: Mutex<ElectionState>,
    callback: Arc<dyn ElectionCallback>,
}

impl LeaderElection {
    /// Creates an election participant on the default namespace.
    pub fn new(session: Arc<dyn CoordinationSession>, callback: Arc<dyn ElectionCallback>) -> Self {
        Self {
            session,
            namespace: ELECTION_NAMESPACE.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            state: Mutex::new(ElectionState::default()),
            callback,
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Sets the bound on evaluation attempts. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Creates this process's identity for a new round.
    ///
    /// Returns the existing identity if the current round already has one.
    ///
    /// # Errors
    /// [`CoordinationError::Unavailable`] if the session is not connected.
    pub fn volunteer(&self) -> CoordinationResult<String> {
        if !self.session.is_connected() {
            return Err(CoordinationError::Unavailable);
        }
        // Held across the check and the create so a round gets one identity.
        let mut state = self.state.lock();
        if let Some(identity) = state.identity.clone() {
            return Ok(identity);
        }

        self.session.create_persistent_if_absent(&self.namespace)?;
        let prefix = child_path(&self.namespace, IDENTITY_PREFIX);
        let full_path = self.session.create_sequential_ephemeral(&prefix, &[])?;
        let identity = node_name(&full_path).to_string();
        info!("Volunteered for leadership as {}", full_path);

        state.round += 1;
        state.identity = Some(identity.clone());
        state.role = NodeRole::Pending;
        state.phase = ElectionPhase::Volunteered;
        state.watched_predecessor = None;
        state.notified = None;
        Ok(identity)
    }

    /// Decides this round's outcome and re-arms the predecessor watch.
    ///
    /// The predecessor can disappear between listing the identities and arming
    /// the watch; the list/predecessor/watch sequence is then repeated, up to
    /// the configured number of attempts.
    ///
    /// # Errors
    /// * [`CoordinationError::Unavailable`] if the session is not connected.
    /// * [`CoordinationError::IdentityLost`] if this node has no live identity.
    /// * [`CoordinationError::RetriesExhausted`] if no watch could be armed.
    pub fn evaluate(&self) -> CoordinationResult<ElectionOutcome> {
        let identity = {
            let state = self.state.lock();
            if state.phase == ElectionPhase::Leader {
                return Ok(ElectionOutcome::Leader);
            }
            state.identity.clone().ok_or_else(|| {
                CoordinationError::IdentityLost("no identity in the current round".to_string())
            })?
        };

        for attempt in 1..=self.max_attempts {
            let mut children = self.session.get_children(&self.namespace, false)?;
            sort_by_sequence(&mut children);

            let Some(position) = children.iter().position(|child| *child == identity) else {
                warn!("Election identity {} is no longer registered", identity);
                self.state.lock().reset();
                return Err(CoordinationError::IdentityLost(identity));
            };

            if position == 0 {
                return Ok(self.transition(ElectionOutcome::Leader, None));
            }

            let predecessor = children[position - 1].clone();
            let predecessor_path = child_path(&self.namespace, &predecessor);
            if self.session.exists(&predecessor_path, true)?.is_some() {
                debug!("{} is watching {}", identity, predecessor);
                return Ok(self.transition(ElectionOutcome::Follower, Some(predecessor)));
            }

            // Sequence suffixes are never reused, so this watch could only leak.
            self.session.remove_watch(&predecessor_path)?;
            let race = CoordinationError::RaceLost(format!(
                "predecessor {} vanished before its watch was armed",
                predecessor
            ));
            COORDINATION_ERROR_COUNTER
                .with_label_values(&[race.category()])
                .inc();
            debug!("{} (attempt {}/{})", race, attempt, self.max_attempts);
            std::thread::yield_now();
        }

        // Any later churn in the namespace will trigger another evaluation.
        self.session.get_children(&self.namespace, true)?;
        warn!(
            "Election for {} did not settle after {} attempts",
            identity, self.max_attempts
        );
        Err(CoordinationError::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }

    fn transition(&self, outcome: ElectionOutcome, predecessor: Option<String>) -> ElectionOutcome {
        let first_in_round = {
            let mut state = self.state.lock();
            state.watched_predecessor = predecessor;
            match outcome {
                ElectionOutcome::Leader => {
                    state.role = NodeRole::Leader;
                    state.phase = ElectionPhase::Leader;
                }
                ElectionOutcome::Follower => {
                    state.role = NodeRole::Follower;
                    state.phase = ElectionPhase::Watching;
                }
            }
            let first = state.notified != Some(outcome);
            state.notified = Some(outcome);
            first
        };

        if first_in_round {
            match outcome {
                ElectionOutcome::Leader => info!("I am the leader"),
                ElectionOutcome::Follower => info!("I am not the leader"),
            }
            outcome.dispatch(self.callback.as_ref());
        }
        outcome
    }

    /// Reacts to a watch notification that concerns the election.
    ///
    /// Returns `Ok(None)` when the event is not relevant to this node.
    pub fn handle_event(&self, event: &WatchedEvent) -> CoordinationResult<Option<ElectionOutcome>> {
        let relevant = match event.kind {
            EventKind::NodeDeleted => {
                let state = self.state.lock();
                state
                    .watched_predecessor
                    .as_ref()
                    .is_some_and(|predecessor| child_path(&self.namespace, predecessor) == event.path)
            }
            EventKind::ChildrenChanged => {
                event.path == self.namespace && self.state.lock().identity.is_some()
            }
            _ => false,
        };

        if !relevant {
            return Ok(None);
        }
        debug!("Re-evaluating election after {} on {}", event.kind, event.path);
        self.evaluate().map(Some)
    }

    /// Invalidates the round after the session was lost. Nothing about
    /// leadership may be assumed until [`LeaderElection::volunteer`] succeeds on
    /// a reconnected session.
    pub fn on_session_lost(&self) {
        let mut state = self.state.lock();
        if state.identity.is_some() {
            warn!(
                "Session lost; abandoning election round {} as {}",
                state.round,
                state.identity.as_deref().unwrap_or_default()
            );
        }
        state.reset();
    }

    /// Withdraws from the election by deleting this node's identity.
    pub fn resign(&self) -> CoordinationResult<()> {
        let identity = self.state.lock().identity.clone();
        if let Some(identity) = identity {
            match self.session.delete(&child_path(&self.namespace, &identity), None) {
                Ok(()) | Err(CoordinationError::NoNode(_)) | Err(CoordinationError::Unavailable) => {}
                Err(e) => return Err(e),
            }
            info!("Resigned from election as {}", identity);
        }
        self.state.lock().reset();
        Ok(())
    }

    pub fn state(&self) -> ElectionState {
        self.state.lock().clone()
    }

    pub fn identity(&self) -> Option<String> {
        self.state.lock().identity.clone()
    }

    pub fn role(&self) -> NodeRole {
        self.state.lock().role
    }

    pub fn is_leader(&self) -> bool {
        self.state.lock().is_leader()
    }
}
