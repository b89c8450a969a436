//! Module for the coordination service contract.
//!
//! The coordination service is a ZooKeeper-style ensemble that provides
//! linearizable node creation, ephemeral and sequential nodes, one-shot watches
//! and children/data reads. Leader election and the service registry are built
//! on top of the [`CoordinationSession`] trait defined here; the session is
//! always passed explicitly, there is no process-global client.
//!
//! Watches are one-shot. A component that wants to keep receiving
//! notifications must request a new watch every time one fires.
//!
//! # Example
//! ```
//! use waypoint::coordination::{CoordinationSession, EventKind, MemoryEnsemble};
//!
//! let ensemble = MemoryEnsemble::new();
//! let (session, mut events) = ensemble.connect();
//! assert_eq!(events.try_recv().unwrap().kind, EventKind::SessionConnected);
//!
//! session.create_persistent_if_absent("/election").unwrap();
//! let path = session
//!     .create_sequential_ephemeral("/election/c_", b"")
//!     .unwrap();
//! assert_eq!(path, "/election/c_0000000000");
//! ```

pub mod error;
pub mod memory;

pub use error::{CoordinationError, CoordinationResult};
pub use memory::{MemoryEnsemble, MemorySession};

use std::fmt;
use tokio::sync::mpsc;

/// Root under which election identities are created.
pub const ELECTION_NAMESPACE: &str = "/election";
/// Root under which workers register their task endpoint.
pub const WORKERS_REGISTRY: &str = "/workers_service_registry";
/// Root under which the elected coordinator registers its search endpoint.
pub const COORDINATORS_REGISTRY: &str = "/coordinators_service_registry";

/// Identifier of a client session, assigned by the coordination service.
pub type SessionId = u64;

/// Receiving half of a session's in-order event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<WatchedEvent>;

/// The kind of notification delivered to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The session is (re)connected and operations may be issued.
    SessionConnected,
    /// The session was lost; its ephemeral nodes are gone.
    SessionDisconnected,
    /// A watched path was created.
    NodeCreated,
    /// A watched node was deleted.
    NodeDeleted,
    /// The children of a watched node changed.
    ChildrenChanged,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::SessionConnected => write!(f, "SessionConnected"),
            EventKind::SessionDisconnected => write!(f, "SessionDisconnected"),
            EventKind::NodeCreated => write!(f, "NodeCreated"),
            EventKind::NodeDeleted => write!(f, "NodeDeleted"),
            EventKind::ChildrenChanged => write!(f, "ChildrenChanged"),
        }
    }
}

/// A single notification. Session events carry an empty path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub kind: EventKind,
    pub path: String,
}

impl WatchedEvent {
    pub fn session(kind: EventKind) -> Self {
        Self {
            kind,
            path: String::new(),
        }
    }

    pub fn node(kind: EventKind, path: &str) -> Self {
        Self {
            kind,
            path: path.to_string(),
        }
    }

    pub fn is_session_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SessionConnected | EventKind::SessionDisconnected
        )
    }
}

/// Metadata returned by [`CoordinationSession::exists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStat {
    pub version: i32,
    pub ephemeral_owner: Option<SessionId>,
    pub num_children: usize,
    pub data_length: usize,
}

/// A connected session to the coordination service.
///
/// All operations fail with [`CoordinationError::Unavailable`] while the
/// session is disconnected. Requesting a watch arms exactly one notification
/// for that path, delivered on the session's [`EventReceiver`].
pub trait CoordinationSession: Send + Sync {
    fn session_id(&self) -> SessionId;

    fn is_connected(&self) -> bool;

    /// Creates `path_prefix` + a service-assigned sequence suffix, owned by
    /// this session. Returns the full path of the created node.
    fn create_sequential_ephemeral(
        &self,
        path_prefix: &str,
        payload: &[u8],
    ) -> CoordinationResult<String>;

    fn create_persistent_if_absent(&self, path: &str) -> CoordinationResult<()>;

    /// Deletes a node. `None` matches any version.
    fn delete(&self, path: &str, version: Option<i32>) -> CoordinationResult<()>;

    fn exists(&self, path: &str, watch: bool) -> CoordinationResult<Option<NodeStat>>;

    /// Withdraws this session's pending exists-watch on `path`, if any.
    /// Sessions that cannot withdraw watches leave them armed.
    fn remove_watch(&self, _path: &str) -> CoordinationResult<()> {
        Ok(())
    }

    fn get_children(&self, path: &str, watch: bool) -> CoordinationResult<Vec<String>>;

    fn get_data(&self, path: &str) -> CoordinationResult<Vec<u8>>;
}

/// Joins a parent path and a child name.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Returns the last component of a path.
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Returns the parent of a path, or `None` for the root.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Extracts the sequence suffix of a sequential node name.
pub fn sequence_of(name: &str) -> Option<u64> {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    name[name.len() - digits..].parse().ok()
}

/// Sorts node names by sequence suffix ascending. Names without a suffix sort
/// last, by name.
pub fn sort_by_sequence(names: &mut [String]) {
    names.sort_by(|a, b| {
        let key_a = sequence_of(a).unwrap_or(u64::MAX);
        let key_b = sequence_of(b).unwrap_or(u64::MAX);
        key_a.cmp(&key_b).then_with(|| a.cmp(b))
    });
}
