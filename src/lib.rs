#![allow(clippy::needless_doctest_main)]
//! # waypoint
//!
//! Waypoint elects a single coordinator among interchangeable nodes, keeps a
//! live, watch-driven list of reachable workers, and uses that list to fan a
//! search query out to the workers and rank their partial results with
//! TF-IDF.
//!
//! ## Features
//!
//! - Leader election on sequential ephemeral nodes, where each follower watches
//!   only its immediate predecessor
//! - Service registry with an atomically replaced address snapshot
//! - Partial-failure tolerant fan-out and TF-IDF ranking
//! - In-memory coordination ensemble for single-process clusters and tests
//! - HTTP endpoints for tasks, searches, status and Prometheus metrics
//! - CLI to run a local cluster and query it
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use waypoint::cluster::ServiceRegistry;
//! use waypoint::coordination::{MemoryEnsemble, WORKERS_REGISTRY};
//!
//! let ensemble = MemoryEnsemble::new();
//!
//! // A worker advertises its task endpoint.
//! let (worker_session, _worker_events) = ensemble.connect();
//! let worker = ServiceRegistry::new(Arc::new(worker_session), WORKERS_REGISTRY);
//! worker.register("http://127.0.0.1:8081/task").unwrap();
//!
//! // The coordinator subscribes and reads the snapshot.
//! let (leader_session, _leader_events) = ensemble.connect();
//! let registry = ServiceRegistry::new(Arc::new(leader_session), WORKERS_REGISTRY);
//! registry.subscribe().unwrap();
//! assert_eq!(registry.get_addresses().as_slice(), ["http://127.0.0.1:8081/task"]);
//! ```
//!
//! ## Running a cluster
//!
//! ```bash
//! waypoint cluster --nodes 3 --base-port 8080 --documents ./resources/books
//! waypoint search --address http://127.0.0.1:8080/search --query "whale ship"
//! ```

pub mod cluster;
pub mod config;
pub mod coordination;
pub mod metrics;
pub mod node;
pub mod search;

pub use cluster::{ElectionCallback, ElectionOutcome, LeaderElection, NodeRole, ServiceRegistry};
pub use config::{ConfigManager, NodeConfig};
pub use coordination::{CoordinationError, CoordinationSession, MemoryEnsemble};
pub use node::Node;
pub use search::{SearchCoordinator, SearchError, SearchWorker};
