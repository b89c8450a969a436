//! Module for switching a node between the worker and coordinator roles.
//!
//! The `RoleController` is the election callback of a node. It never talks to
//! workers; it only flips the local service mode and keeps the node's
//! registrations in line with it.

use crate::cluster::leader::ElectionCallback;
use crate::cluster::registry::ServiceRegistry;
use crate::metrics::LEADERSHIP_COUNTER;
use crate::search::{SearchCoordinator, SearchWorker};
use log::{error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which HTTP service a node currently answers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceMode {
    #[default]
    Unset,
    Worker,
    Coordinator,
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceMode::Unset => write!(f, "Unset"),
            ServiceMode::Worker => write!(f, "Worker"),
            ServiceMode::Coordinator => write!(f, "Coordinator"),
        }
    }
}

pub struct RoleController {
    base_url: String,
    workers: Arc<ServiceRegistry>,
    coordinators: Arc<ServiceRegistry>,
    coordinator: Option<Arc<SearchCoordinator>>,
    mode: RwLock<ServiceMode>,
}

impl RoleController {
    /// Creates a controller for a node reachable at `base_url`
    /// (`http://host:port`).
    pub fn new(
        base_url: &str,
        workers: Arc<ServiceRegistry>,
        coordinators: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            workers,
            coordinators,
            coordinator: None,
            mode: RwLock::new(ServiceMode::Unset),
        }
    }

    /// Refreshes this coordinator's documents on its first search after the
    /// node becomes leader.
    pub fn with_coordinator(mut self, coordinator: Arc<SearchCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn mode(&self) -> ServiceMode {
        *self.mode.read()
    }

    pub fn worker_address(&self) -> String {
        format!("{}{}", self.base_url, SearchWorker::ENDPOINT)
    }

    pub fn coordinator_address(&self) -> String {
        format!("{}{}", self.base_url, SearchCoordinator::ENDPOINT)
    }

    /// Forgets registrations and the current mode after the session was lost.
    /// The ephemeral nodes are already gone with the session.
    pub fn on_session_lost(&self) {
        self.workers.forget_registration();
        self.coordinators.forget_registration();
        *self.mode.write() = ServiceMode::Unset;
        info!("Service mode reset after session loss");
    }
}

impl ElectionCallback for RoleController {
    fn on_elected_leader(&self) {
        LEADERSHIP_COUNTER.inc();

        // The own task endpoint must be gone and the worker list loaded before
        // searches are accepted.
        if let Err(e) = self.workers.unregister() {
            warn!("Failed to unregister worker endpoint: {}", e);
        }
        if let Err(e) = self.workers.subscribe() {
            error!("Failed to subscribe to worker registry: {}", e);
        }
        if let Some(coordinator) = &self.coordinator {
            coordinator.mark_documents_stale();
        }
        *self.mode.write() = ServiceMode::Coordinator;

        if let Err(e) = self.coordinators.register(&self.coordinator_address()) {
            error!("Failed to register coordinator endpoint: {}", e);
        }
        info!("Serving searches at {}", self.coordinator_address());
    }

    fn on_worker(&self) {
        *self.mode.write() = ServiceMode::Worker;

        if let Err(e) = self.workers.register(&self.worker_address()) {
            error!("Failed to register worker endpoint: {}", e);
            return;
        }
        info!("Serving tasks at {}", self.worker_address());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::{COORDINATORS_REGISTRY, MemoryEnsemble, WORKERS_REGISTRY};
    use crate::search::HttpWorkerClient;

    fn controller(ensemble: &MemoryEnsemble, port: u16) -> RoleController {
        let (session, _events) = ensemble.connect();
        let session = Arc::new(session);
        RoleController::new(
            &format!("http://127.0.0.1:{}", port),
            Arc::new(ServiceRegistry::new(session.clone(), WORKERS_REGISTRY)),
            Arc::new(ServiceRegistry::new(session, COORDINATORS_REGISTRY)),
        )
    }

    #[test]
    fn test_worker_registers_task_endpoint() {
        let ensemble = MemoryEnsemble::new();
        let role = controller(&ensemble, 8081);

        role.on_worker();
        assert_eq!(role.mode(), ServiceMode::Worker);

        let children = ensemble.children_of(WORKERS_REGISTRY);
        assert_eq!(children.len(), 1);
    }

    /// Tests promotion from worker to coordinator.
    ///
    /// # Purpose
    /// A worker that is elected leader withdraws its worker endpoint and
    /// advertises its search endpoint instead.
    ///
    /// # Steps
    /// 1. Run the worker callback, then the leader callback.
    /// 2. Verify the workers registry is empty and the coordinators registry
    ///    holds one entry.
    #[test]
    fn test_promotion_swaps_registrations() {
        let ensemble = MemoryEnsemble::new();
        let role = controller(&ensemble, 8081);

        role.on_worker();
        role.on_elected_leader();

        assert_eq!(role.mode(), ServiceMode::Coordinator);
        assert!(ensemble.children_of(WORKERS_REGISTRY).is_empty());
        assert_eq!(ensemble.children_of(COORDINATORS_REGISTRY).len(), 1);
        assert_eq!(role.coordinator_address(), "http://127.0.0.1:8081/search");
    }

    /// Tests what promotion leaves for the first search.
    ///
    /// # Purpose
    /// Promotion loads the worker list but leaves the document directory to
    /// the first search.
    ///
    /// # Steps
    /// 1. Build a controller with a coordinator over one document.
    /// 2. Add a second document and run the leader callback.
    /// 3. Verify the worker cache exists and the documents are only marked
    ///    stale.
    #[test]
    fn test_promotion_defers_document_reload() {
        let ensemble = MemoryEnsemble::new();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "dog").unwrap();

        let (session, _events) = ensemble.connect();
        let session = Arc::new(session);
        let workers = Arc::new(ServiceRegistry::new(session.clone(), WORKERS_REGISTRY));
        let coordinator = Arc::new(
            SearchCoordinator::from_directory(
                workers.clone(),
                Arc::new(HttpWorkerClient::default()),
                dir.path(),
                "*.txt",
            )
            .unwrap(),
        );
        let role = RoleController::new(
            "http://127.0.0.1:8081",
            workers.clone(),
            Arc::new(ServiceRegistry::new(session, COORDINATORS_REGISTRY)),
        )
        .with_coordinator(coordinator.clone());

        std::fs::write(dir.path().join("b.txt"), "cat").unwrap();
        role.on_elected_leader();

        assert_eq!(role.mode(), ServiceMode::Coordinator);
        assert!(workers.cached_addresses().is_some());
        assert!(coordinator.documents_stale());
        assert_eq!(coordinator.documents().len(), 1);
    }

    #[test]
    fn test_session_loss_resets_mode() {
        let ensemble = MemoryEnsemble::new();
        let role = controller(&ensemble, 8082);
        role.on_worker();
        role.on_session_lost();
        assert_eq!(role.mode(), ServiceMode::Unset);
    }
}
