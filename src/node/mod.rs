//! Module for a cluster node.
//!
//! A `Node` wires one coordination session into an election participant,
//! the two service registries, the role controller and the search services,
//! and serves them over HTTP. Which role it plays is decided by the election;
//! every node starts out able to do both.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use waypoint::config::NodeConfig;
//! use waypoint::coordination::MemoryEnsemble;
//! use waypoint::node::Node;
//! use waypoint::search::HttpWorkerClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ensemble = MemoryEnsemble::new();
//!     let (session, events) = ensemble.connect();
//!     let node = Node::new(
//!         NodeConfig::default(),
//!         Arc::new(session),
//!         Arc::new(HttpWorkerClient::default()),
//!     )?;
//!     let handle = node.start(events)?;
//!     handle.stop().await;
//!     Ok(())
//! }
//! ```

pub mod event_loop;
pub mod role;
pub mod server;

pub use event_loop::NodeEventLoop;
pub use role::{RoleController, ServiceMode};
pub use server::{NodeStatus, ServerState};

use crate::cluster::leader::LeaderElection;
use crate::cluster::registry::ServiceRegistry;
use crate::config::NodeConfig;
use crate::coordination::{CoordinationSession, EventReceiver};
use crate::search::{SearchCoordinator, SearchResult, SearchWorker, WorkerClient};
use actix_web::dev::ServerHandle;
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct Node {
    config: NodeConfig,
    node_id: String,
    election: Arc<LeaderElection>,
    role: Arc<RoleController>,
    workers: Arc<ServiceRegistry>,
    coordinators: Arc<ServiceRegistry>,
    coordinator: Arc<SearchCoordinator>,
}

impl Node {
    /// Builds a node on `session`. Worker calls made while coordinating go
    /// through `client`.
    pub fn new(
        config: NodeConfig,
        session: Arc<dyn CoordinationSession>,
        client: Arc<dyn WorkerClient>,
    ) -> SearchResult<Self> {
        let workers = Arc::new(ServiceRegistry::new(
            session.clone(),
            &config.coordination.workers_registry,
        ));
        let coordinators = Arc::new(ServiceRegistry::new(
            session.clone(),
            &config.coordination.coordinators_registry,
        ));
        let coordinator = Arc::new(SearchCoordinator::from_directory(
            workers.clone(),
            client,
            &config.search.documents_dir,
            &config.search.documents_pattern,
        )?);
        let role = Arc::new(
            RoleController::new(&config.base_url(), workers.clone(), coordinators.clone())
                .with_coordinator(coordinator.clone()),
        );
        let election = Arc::new(
            LeaderElection::new(session, role.clone())
                .with_namespace(&config.coordination.election_namespace)
                .with_max_attempts(config.coordination.max_election_attempts),
        );

        Ok(Self {
            config,
            node_id: Uuid::new_v4().to_string(),
            election,
            role,
            workers,
            coordinators,
            coordinator,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn election(&self) -> Arc<LeaderElection> {
        self.election.clone()
    }

    pub fn role(&self) -> Arc<RoleController> {
        self.role.clone()
    }

    pub fn workers(&self) -> Arc<ServiceRegistry> {
        self.workers.clone()
    }

    pub fn coordinators(&self) -> Arc<ServiceRegistry> {
        self.coordinators.clone()
    }

    pub fn coordinator(&self) -> Arc<SearchCoordinator> {
        self.coordinator.clone()
    }

    pub fn event_loop(&self) -> NodeEventLoop {
        NodeEventLoop::new(self.election.clone(), self.role.clone(), self.workers.clone())
    }

    pub fn server_state(&self) -> ServerState {
        ServerState {
            node_id: self.node_id.clone(),
            started_at: Utc::now(),
            election: self.election.clone(),
            role: self.role.clone(),
            worker: SearchWorker::new(),
            coordinator: self.coordinator.clone(),
        }
    }

    /// Binds the HTTP server and spawns it together with the event loop.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, events: EventReceiver) -> std::io::Result<NodeHandle> {
        let server = server::run_server(
            self.server_state(),
            &self.config.network.host,
            self.config.network.port,
        )?;
        let server_handle = server.handle();
        let server_task = tokio::spawn(server);
        let event_task = tokio::spawn(self.event_loop().run(events));
        info!(
            "Node {} listening on {}",
            self.node_id,
            self.config.base_url()
        );

        Ok(NodeHandle {
            node_id: self.node_id.clone(),
            election: self.election.clone(),
            workers: self.workers.clone(),
            coordinators: self.coordinators.clone(),
            server: server_handle,
            server_task,
            event_task,
        })
    }
}

/// A running node.
pub struct NodeHandle {
    node_id: String,
    election: Arc<LeaderElection>,
    workers: Arc<ServiceRegistry>,
    coordinators: Arc<ServiceRegistry>,
    server: ServerHandle,
    server_task: JoinHandle<std::io::Result<()>>,
    event_task: JoinHandle<()>,
}

impl NodeHandle {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Withdraws from the cluster and stops serving.
    pub async fn stop(self) {
        for registry in [&self.workers, &self.coordinators] {
            if let Err(e) = registry.unregister() {
                warn!("Failed to unregister from {}: {}", registry.registry_path(), e);
            }
        }
        if let Err(e) = self.election.resign() {
            warn!("Failed to resign from election: {}", e);
        }
        self.server.stop(true).await;
        self.event_task.abort();
        if let Ok(Err(e)) = self.server_task.await {
            warn!("HTTP server exited with error: {}", e);
        }
        info!("Node {} stopped", self.node_id);
    }
}
