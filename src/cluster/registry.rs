//! Module for the service registry.
//!
//! A `ServiceRegistry` lets a node advertise an address under a registry path
//! as a sequential ephemeral node, and lets the leader keep an up-to-date
//! snapshot of every address advertised there. The snapshot is replaced
//! wholesale on each refresh; readers hold an `Arc` to an immutable list and
//! never observe a partially built one.

use crate::coordination::{
    CoordinationError, CoordinationResult, CoordinationSession, EventKind, WatchedEvent,
    child_path, node_name, sort_by_sequence,
};
use crate::metrics::REGISTRY_REFRESH_COUNTER;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

const REGISTRATION_PREFIX: &str = "n_";

/// Shared, immutable address snapshot.
pub type AddressList = Arc<Vec<String>>;

pub struct ServiceRegistry {
    session: Arc<dyn CoordinationSession>,
    registry_path: String,
    node_path: Mutex<Option<String>>,
    addresses: Mutex<Option<AddressList>>,
    // Held from the listing until the snapshot is stored.
    refresh_lock: Mutex<()>,
    refreshes: AtomicU64,
}

impl ServiceRegistry {
    pub fn new(session: Arc<dyn CoordinationSession>, registry_path: &str) -> Self {
        Self {
            session,
            registry_path: registry_path.to_string(),
            node_path: Mutex::new(None),
            addresses: Mutex::new(None),
            refresh_lock: Mutex::new(()),
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn registry_path(&self) -> &str {
        &self.registry_path
    }

    /// Ensures the persistent registry root exists. Idempotent.
    pub fn create_registry_node(&self) -> CoordinationResult<()> {
        self.session.create_persistent_if_absent(&self.registry_path)
    }

    /// Advertises `address` under the registry path.
    ///
    /// Returns the full path of the registration node. Registering again while
    /// a registration is held returns the existing path.
    pub fn register(&self, address: &str) -> CoordinationResult<String> {
        let mut node_path = self.node_path.lock();
        if let Some(existing) = node_path.as_ref() {
            debug!("{} is already registered as {}", address, existing);
            return Ok(existing.clone());
        }

        self.create_registry_node()?;
        let prefix = child_path(&self.registry_path, REGISTRATION_PREFIX);
        let path = self
            .session
            .create_sequential_ephemeral(&prefix, address.as_bytes())?;
        info!("Registered {} to the cluster as {}", address, path);
        *node_path = Some(path.clone());
        Ok(path)
    }

    /// Removes this process's registration if it exists. A registration that
    /// already vanished is not an error.
    pub fn unregister(&self) -> CoordinationResult<()> {
        let Some(path) = self.node_path.lock().take() else {
            return Ok(());
        };
        match self.session.delete(&path, None) {
            Ok(()) => {
                info!("Unregistered {} from the cluster", path);
                Ok(())
            }
            Err(CoordinationError::NoNode(_)) | Err(CoordinationError::Unavailable) => {
                debug!("Registration {} was already gone", path);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Drops the local record of the registration without touching the
    /// coordination service, for use after the session expired.
    pub fn forget_registration(&self) {
        self.node_path.lock().take();
    }

    pub fn is_registered(&self) -> bool {
        self.node_path.lock().is_some()
    }

    /// Performs an initial refresh, which arms the children watch.
    pub fn subscribe(&self) -> CoordinationResult<AddressList> {
        self.update_addresses()
    }

    /// Returns the current snapshot, performing a synchronous refresh if no
    /// snapshot exists yet. Failures yield an empty list.
    pub fn get_addresses(&self) -> AddressList {
        if let Some(addresses) = self.cached_addresses() {
            return addresses;
        }
        match self.update_addresses() {
            Ok(addresses) => addresses,
            Err(e) => {
                error!(
                    "Failed to read addresses from {}: {}",
                    self.registry_path, e
                );
                Arc::new(Vec::new())
            }
        }
    }

    pub fn cached_addresses(&self) -> Option<AddressList> {
        self.addresses.lock().clone()
    }

    /// Rebuilds the snapshot from the registry's children and re-arms the
    /// children watch.
    ///
    /// Children that disappear between the listing and the data read are
    /// skipped. Refreshes run one at a time, so a snapshot listed earlier never
    /// replaces one listed later.
    pub fn update_addresses(&self) -> CoordinationResult<AddressList> {
        let _refresh = self.refresh_lock.lock();
        self.create_registry_node()?;
        let mut children = self.session.get_children(&self.registry_path, true)?;
        sort_by_sequence(&mut children);

        let mut addresses = Vec::with_capacity(children.len());
        for child in &children {
            let path = child_path(&self.registry_path, child);
            match self.session.get_data(&path) {
                Ok(data) => match String::from_utf8(data) {
                    Ok(address) => addresses.push(address),
                    Err(_) => warn!("Registration {} does not hold a UTF-8 address", path),
                },
                Err(CoordinationError::NoNode(_)) => {
                    debug!("Registration {} vanished during refresh", node_name(&path));
                }
                Err(e) => return Err(e),
            }
        }

        let snapshot = Arc::new(addresses);
        *self.addresses.lock() = Some(snapshot.clone());
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        REGISTRY_REFRESH_COUNTER.inc();
        info!("The cluster addresses are: {:?}", snapshot);
        Ok(snapshot)
    }

    /// Refreshes on every children change of the registry path.
    ///
    /// Returns `Ok(None)` when the event does not concern this registry.
    pub fn handle_event(&self, event: &WatchedEvent) -> CoordinationResult<Option<AddressList>> {
        if event.kind != EventKind::ChildrenChanged || event.path != self.registry_path {
            return Ok(None);
        }
        self.update_addresses().map(Some)
    }

    /// Number of completed refreshes.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }
}
