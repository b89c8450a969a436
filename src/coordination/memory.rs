//! Module for the in-process coordination ensemble.
//!
//! `MemoryEnsemble` keeps the whole node tree behind a single mutex, which makes
//! every operation linearizable. Each connected client gets a [`MemorySession`]
//! and an [`EventReceiver`]; events for a session are delivered in the order the
//! ensemble produced them.
//!
//! Sequence suffixes are assigned per parent, zero-padded to ten digits, and
//! never reused. Watches are one-shot and are discarded when they fire or when
//! their session expires.

use super::{
    CoordinationError, CoordinationResult, CoordinationSession, EventKind, EventReceiver,
    NodeStat, SessionId, WatchedEvent, node_name, parent_path,
};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug)]
struct ZNode {
    data: Vec<u8>,
    version: i32,
    ephemeral_owner: Option<SessionId>,
    children: BTreeSet<String>,
    next_sequence: u64,
}

impl ZNode {
    fn new(data: Vec<u8>, ephemeral_owner: Option<SessionId>) -> Self {
        Self {
            data,
            version: 0,
            ephemeral_owner,
            children: BTreeSet::new(),
            next_sequence: 0,
        }
    }

    fn stat(&self) -> NodeStat {
        NodeStat {
            version: self.version,
            ephemeral_owner: self.ephemeral_owner,
            num_children: self.children.len(),
            data_length: self.data.len(),
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    connected: bool,
    events: mpsc::UnboundedSender<WatchedEvent>,
}

#[derive(Debug)]
struct EnsembleState {
    nodes: HashMap<String, ZNode>,
    sessions: HashMap<SessionId, SessionEntry>,
    next_session_id: SessionId,
    data_watches: HashMap<String, HashSet<SessionId>>,
    child_watches: HashMap<String, HashSet<SessionId>>,
}

impl EnsembleState {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert("/".to_string(), ZNode::new(Vec::new(), None));
        Self {
            nodes,
            sessions: HashMap::new(),
            next_session_id: 1,
            data_watches: HashMap::new(),
            child_watches: HashMap::new(),
        }
    }

    fn ensure_connected(&self, session: SessionId) -> CoordinationResult<()> {
        match self.sessions.get(&session) {
            Some(entry) if entry.connected => Ok(()),
            _ => Err(CoordinationError::Unavailable),
        }
    }

    fn notify(&self, session: SessionId, event: WatchedEvent) {
        if let Some(entry) = self.sessions.get(&session) {
            if entry.connected {
                let _ = entry.events.send(event);
            }
        }
    }

    fn fire_data_watches(&mut self, path: &str, kind: EventKind) {
        if let Some(watchers) = self.data_watches.remove(path) {
            for session in watchers {
                self.notify(session, WatchedEvent::node(kind, path));
            }
        }
    }

    fn fire_child_watches(&mut self, path: &str, kind: EventKind) {
        if let Some(watchers) = self.child_watches.remove(path) {
            for session in watchers {
                self.notify(session, WatchedEvent::node(kind, path));
            }
        }
    }

    fn create(
        &mut self,
        owner: SessionId,
        path: &str,
        data: &[u8],
        ephemeral: bool,
        sequential: bool,
    ) -> CoordinationResult<String> {
        if !path.starts_with('/') || path == "/" || (!sequential && path.ends_with('/')) {
            return Err(CoordinationError::InvalidPath(path.to_string()));
        }
        let parent = parent_path(path).ok_or_else(|| CoordinationError::InvalidPath(path.to_string()))?;
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| CoordinationError::NoNode(parent.to_string()))?;
        if parent_node.ephemeral_owner.is_some() {
            return Err(CoordinationError::InvalidPath(format!(
                "{} is ephemeral and cannot have children",
                parent
            )));
        }

        let full_path = if sequential {
            let sequence = parent_node.next_sequence;
            parent_node.next_sequence += 1;
            format!("{}{:010}", path, sequence)
        } else {
            path.to_string()
        };

        if self.nodes.contains_key(&full_path) {
            return Err(CoordinationError::NodeExists(full_path));
        }

        let owner = if ephemeral { Some(owner) } else { None };
        self.nodes
            .insert(full_path.clone(), ZNode::new(data.to_vec(), owner));
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.insert(node_name(&full_path).to_string());
        }

        self.fire_data_watches(&full_path, EventKind::NodeCreated);
        self.fire_child_watches(parent, EventKind::ChildrenChanged);
        Ok(full_path)
    }

    fn delete(&mut self, path: &str, version: Option<i32>) -> CoordinationResult<()> {
        if path == "/" {
            return Err(CoordinationError::InvalidPath(path.to_string()));
        }
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?;
        if !node.children.is_empty() {
            return Err(CoordinationError::NotEmpty(path.to_string()));
        }
        if let Some(expected) = version {
            if expected != node.version {
                return Err(CoordinationError::BadVersion {
                    path: path.to_string(),
                    expected,
                    actual: node.version,
                });
            }
        }
        self.remove_node(path);
        Ok(())
    }

    fn remove_node(&mut self, path: &str) {
        if self.nodes.remove(path).is_none() {
            return;
        }
        if let Some(parent) = parent_path(path) {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.remove(node_name(path));
            }
        }

        self.fire_data_watches(path, EventKind::NodeDeleted);
        self.fire_child_watches(path, EventKind::NodeDeleted);
        if let Some(parent) = parent_path(path) {
            self.fire_child_watches(parent, EventKind::ChildrenChanged);
        }
    }

    fn open_session(&mut self) -> (SessionId, EventReceiver) {
        let id = self.next_session_id;
        self.next_session_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.insert(
            id,
            SessionEntry {
                connected: true,
                events: tx,
            },
        );
        self.notify(id, WatchedEvent::session(EventKind::SessionConnected));
        (id, rx)
    }

    fn drop_watches(&mut self, session: SessionId) {
        for watchers in self.data_watches.values_mut() {
            watchers.remove(&session);
        }
        for watchers in self.child_watches.values_mut() {
            watchers.remove(&session);
        }
        self.data_watches.retain(|_, watchers| !watchers.is_empty());
        self.child_watches.retain(|_, watchers| !watchers.is_empty());
    }

    fn remove_ephemerals(&mut self, session: SessionId) {
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();
        for path in owned {
            debug!("Removing ephemeral node {} of session {}", path, session);
            self.remove_node(&path);
        }
    }

    fn expire(&mut self, session: SessionId) -> bool {
        if !self.sessions.contains_key(&session) {
            return false;
        }
        self.drop_watches(session);
        self.remove_ephemerals(session);
        if let Some(entry) = self.sessions.get_mut(&session) {
            if entry.connected {
                let _ = entry
                    .events
                    .send(WatchedEvent::session(EventKind::SessionDisconnected));
            }
            entry.connected = false;
        }
        true
    }

    fn reconnect(&mut self, session: SessionId) -> bool {
        match self.sessions.get_mut(&session) {
            Some(entry) if !entry.connected => {
                entry.connected = true;
                self.notify(session, WatchedEvent::session(EventKind::SessionConnected));
                true
            }
            _ => false,
        }
    }

    fn close(&mut self, session: SessionId) {
        self.drop_watches(session);
        self.remove_ephemerals(session);
        self.sessions.remove(&session);
    }
}

/// A process-local coordination ensemble shared by any number of sessions.
///
/// # Examples
///
/// ```
/// use waypoint::coordination::{CoordinationSession, EventKind, MemoryEnsemble};
///
/// let ensemble = MemoryEnsemble::new();
/// let (owner, _owner_events) = ensemble.connect();
/// let (observer, mut events) = ensemble.connect();
/// events.try_recv().unwrap();
///
/// owner.create_persistent_if_absent("/workers").unwrap();
/// let node = owner.create_sequential_ephemeral("/workers/n_", b"addr").unwrap();
/// observer.exists(&node, true).unwrap();
///
/// ensemble.expire_session(owner.session_id());
/// let event = events.try_recv().unwrap();
/// assert_eq!(event.kind, EventKind::NodeDeleted);
/// assert_eq!(event.path, node);
/// ```
#[derive(Clone, Debug)]
pub struct MemoryEnsemble {
    state: Arc<Mutex<EnsembleState>>,
}

impl Default for MemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEnsemble {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EnsembleState::new())),
        }
    }

    /// Opens a new session. `SessionConnected` is the first event delivered.
    pub fn connect(&self) -> (MemorySession, EventReceiver) {
        let (id, events) = self.state.lock().open_session();
        info!("Opened coordination session {}", id);
        (
            MemorySession {
                id,
                state: self.state.clone(),
            },
            events,
        )
    }

    /// Ends a session's liveness: its ephemeral nodes are deleted, its watches
    /// are dropped and it receives `SessionDisconnected`.
    pub fn expire_session(&self, session: SessionId) -> bool {
        let expired = self.state.lock().expire(session);
        if expired {
            info!("Expired coordination session {}", session);
        }
        expired
    }

    /// Reconnects an expired session. It receives `SessionConnected` and owns
    /// no nodes.
    pub fn reconnect_session(&self, session: SessionId) -> bool {
        let reconnected = self.state.lock().reconnect(session);
        if reconnected {
            info!("Reconnected coordination session {}", session);
        }
        reconnected
    }

    pub fn close_session(&self, session: SessionId) {
        self.state.lock().close(session);
        info!("Closed coordination session {}", session);
    }

    /// Lists children without a session and without arming watches.
    pub fn children_of(&self, path: &str) -> Vec<String> {
        self.state
            .lock()
            .nodes
            .get(path)
            .map(|node| node.children.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn node_exists(&self, path: &str) -> bool {
        self.state.lock().nodes.contains_key(path)
    }

    /// Deletes a node on behalf of an operator, regardless of its owner.
    pub fn delete_node(&self, path: &str) -> CoordinationResult<()> {
        self.state.lock().delete(path, None)
    }

    /// Number of sessions holding an exists-watch on `path`.
    pub fn exists_watchers(&self, path: &str) -> usize {
        self.state
            .lock()
            .data_watches
            .get(path)
            .map_or(0, HashSet::len)
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }
}

/// One client's session against a [`MemoryEnsemble`].
#[derive(Clone, Debug)]
pub struct MemorySession {
    id: SessionId,
    state: Arc<Mutex<EnsembleState>>,
}

impl MemorySession {
    pub fn ensemble(&self) -> MemoryEnsemble {
        MemoryEnsemble {
            state: self.state.clone(),
        }
    }

    pub fn close(&self) {
        self.state.lock().close(self.id);
    }
}

impl CoordinationSession for MemorySession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn is_connected(&self) -> bool {
        self.state.lock().ensure_connected(self.id).is_ok()
    }

    fn create_sequential_ephemeral(
        &self,
        path_prefix: &str,
        payload: &[u8],
    ) -> CoordinationResult<String> {
        let mut state = self.state.lock();
        state.ensure_connected(self.id)?;
        state.create(self.id, path_prefix, payload, true, true)
    }

    fn create_persistent_if_absent(&self, path: &str) -> CoordinationResult<()> {
        let mut state = self.state.lock();
        state.ensure_connected(self.id)?;
        match state.create(self.id, path, &[], false, false) {
            Ok(_) | Err(CoordinationError::NodeExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn delete(&self, path: &str, version: Option<i32>) -> CoordinationResult<()> {
        let mut state = self.state.lock();
        state.ensure_connected(self.id)?;
        state.delete(path, version)
    }

    fn exists(&self, path: &str, watch: bool) -> CoordinationResult<Option<NodeStat>> {
        let mut state = self.state.lock();
        state.ensure_connected(self.id)?;
        if watch {
            state
                .data_watches
                .entry(path.to_string())
                .or_default()
                .insert(self.id);
        }
        Ok(state.nodes.get(path).map(ZNode::stat))
    }

    fn remove_watch(&self, path: &str) -> CoordinationResult<()> {
        let mut state = self.state.lock();
        state.ensure_connected(self.id)?;
        if let Some(watchers) = state.data_watches.get_mut(path) {
            watchers.remove(&self.id);
            if watchers.is_empty() {
                state.data_watches.remove(path);
            }
        }
        Ok(())
    }

    fn get_children(&self, path: &str, watch: bool) -> CoordinationResult<Vec<String>> {
        let mut state = self.state.lock();
        state.ensure_connected(self.id)?;
        let children: Vec<String> = state
            .nodes
            .get(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?
            .children
            .iter()
            .cloned()
            .collect();
        if watch {
            state
                .child_watches
                .entry(path.to_string())
                .or_default()
                .insert(self.id);
        }
        Ok(children)
    }

    fn get_data(&self, path: &str) -> CoordinationResult<Vec<u8>> {
        let state = self.state.lock();
        state.ensure_connected(self.id)?;
        state
            .nodes
            .get(path)
            .map(|node| node.data.clone())
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))
    }
}
