//! Module for the node's coordination event loop.
//!
//! Every notification of a node's session passes through one
//! `NodeEventLoop`, in delivery order. Handlers only touch local state and
//! issue the coordination calls needed to re-arm watches, so a slow event
//! never stalls the ones behind it.

use crate::cluster::leader::{ElectionOutcome, LeaderElection};
use crate::cluster::registry::ServiceRegistry;
use crate::coordination::{CoordinationError, EventKind, EventReceiver, WatchedEvent};
use crate::metrics::COORDINATION_ERROR_COUNTER;
use crate::node::role::RoleController;
use log::{debug, error, info, warn};
use std::sync::Arc;

pub struct NodeEventLoop {
    election: Arc<LeaderElection>,
    role: Arc<RoleController>,
    workers: Arc<ServiceRegistry>,
}

impl NodeEventLoop {
    pub fn new(
        election: Arc<LeaderElection>,
        role: Arc<RoleController>,
        workers: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            election,
            role,
            workers,
        }
    }

    /// Handles one event.
    pub fn process(&self, event: &WatchedEvent) {
        if event.is_session_event() {
            debug!("Processing session event {}", event.kind);
        } else {
            debug!("Processing {} on {}", event.kind, event.path);
        }
        match event.kind {
            EventKind::SessionConnected => {
                info!("Successfully connected to the coordination service");
                self.join_election();
            }
            EventKind::SessionDisconnected => {
                warn!("Disconnected from the coordination service");
                self.election.on_session_lost();
                self.role.on_session_lost();
            }
            EventKind::ChildrenChanged if event.path == self.workers.registry_path() => {
                if let Err(e) = self.workers.handle_event(event) {
                    COORDINATION_ERROR_COUNTER
                        .with_label_values(&[e.category()])
                        .inc();
                    error!("Failed to refresh worker addresses: {}", e);
                }
            }
            EventKind::NodeDeleted | EventKind::ChildrenChanged => {
                let outcome = self.election.handle_event(event);
                self.settle(outcome);
            }
            EventKind::NodeCreated => {}
        }
    }

    /// Handles every event already queued and returns how many there were.
    pub fn drain(&self, events: &mut EventReceiver) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.process(&event);
            handled += 1;
        }
        handled
    }

    /// Handles events until the session's stream ends.
    pub async fn run(self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            self.process(&event);
        }
        info!("Coordination event stream closed");
    }

    fn join_election(&self) {
        if self.election.identity().is_some() {
            return;
        }
        if let Err(e) = self.election.volunteer() {
            error!("Failed to volunteer for leadership: {}", e);
            return;
        }
        let outcome = self.election.evaluate().map(Some);
        self.settle(outcome);
    }

    fn settle(&self, outcome: Result<Option<ElectionOutcome>, CoordinationError>) {
        match outcome {
            Ok(_) => {}
            Err(CoordinationError::IdentityLost(identity)) => {
                warn!("Lost election identity {}; volunteering again", identity);
                self.join_election();
            }
            Err(e @ CoordinationError::RetriesExhausted { .. }) => {
                warn!("{}; waiting for the next election change", e);
            }
            Err(e) => {
                COORDINATION_ERROR_COUNTER
                    .with_label_values(&[e.category()])
                    .inc();
                if e.is_recoverable() {
                    warn!("Election step failed, retrying on the next change: {}", e);
                } else {
                    error!("Election failed: {}", e);
                }
            }
        }
    }
}
