use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use waypoint::cluster::ServiceRegistry;
use waypoint::coordination::{
    CoordinationResult, CoordinationSession, EventKind, EventReceiver, MemoryEnsemble,
    MemorySession, NodeStat, SessionId, WORKERS_REGISTRY,
};

fn worker_address(port: u16) -> String {
    format!("http://127.0.0.1:{}/task", port)
}

fn leader_registry(ensemble: &MemoryEnsemble) -> (Arc<ServiceRegistry>, MemorySession, EventReceiver) {
    let (session, mut events) = ensemble.connect();
    events.try_recv().unwrap();
    let registry = Arc::new(ServiceRegistry::new(
        Arc::new(session.clone()),
        WORKERS_REGISTRY,
    ));
    (registry, session, events)
}

fn register_worker(ensemble: &MemoryEnsemble, port: u16) -> (ServiceRegistry, MemorySession) {
    let (session, _events) = ensemble.connect();
    let registry = ServiceRegistry::new(Arc::new(session.clone()), WORKERS_REGISTRY);
    registry.register(&worker_address(port)).unwrap();
    (registry, session)
}

/// Tests that the registry watch is re-armed after every change.
///
/// # Purpose
/// N consecutive joins produce N notifications and N refreshes; the watch
/// never goes quiet after the first one.
///
/// # Steps
/// 1. Subscribe a leader registry.
/// 2. Register five workers one at a time, handling the leader's events after
///    each.
/// 3. Verify one event per join, six refreshes in total and the full list.
#[test]
fn test_every_change_triggers_a_refresh() {
    let ensemble = MemoryEnsemble::new();
    let (registry, _session, mut events) = leader_registry(&ensemble);
    registry.subscribe().unwrap();

    let mut workers = Vec::new();
    for port in 8081..8086 {
        workers.push(register_worker(&ensemble, port));

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::ChildrenChanged);
        assert_eq!(event.path, WORKERS_REGISTRY);
        assert!(events.try_recv().is_err());
        assert!(registry.handle_event(&event).unwrap().is_some());
    }

    assert_eq!(registry.refresh_count(), 6);
    let expected: Vec<String> = (8081..8086).map(worker_address).collect();
    assert_eq!(registry.get_addresses().as_slice(), expected.as_slice());
}

/// Tests that departed workers leave the snapshot.
///
/// # Purpose
/// A worker whose session ends is dropped on the next refresh.
///
/// # Steps
/// 1. Register two workers and subscribe.
/// 2. Expire the first worker's session and handle the notification.
/// 3. Verify only the second address remains.
#[test]
fn test_expired_worker_is_removed() {
    let ensemble = MemoryEnsemble::new();
    let (first, first_session) = register_worker(&ensemble, 8081);
    let (_second, _second_session) = register_worker(&ensemble, 8082);
    let (registry, _session, mut events) = leader_registry(&ensemble);
    registry.subscribe().unwrap();
    assert_eq!(registry.get_addresses().len(), 2);

    ensemble.expire_session(first_session.session_id());
    let event = events.try_recv().unwrap();
    registry.handle_event(&event).unwrap();

    assert_eq!(registry.get_addresses().as_slice(), [worker_address(8082)]);
    assert!(first.is_registered());
    assert!(first.unregister().is_ok());
}

/// Session that deletes the first node it is asked to read.
struct VanishingReadSession {
    inner: MemorySession,
    vanished: AtomicBool,
}

impl CoordinationSession for VanishingReadSession {
    fn session_id(&self) -> SessionId {
        self.inner.session_id()
    }
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
    fn create_sequential_ephemeral(&self, prefix: &str, payload: &[u8]) -> CoordinationResult<String> {
        self.inner.create_sequential_ephemeral(prefix, payload)
    }
    fn create_persistent_if_absent(&self, path: &str) -> CoordinationResult<()> {
        self.inner.create_persistent_if_absent(path)
    }
    fn delete(&self, path: &str, version: Option<i32>) -> CoordinationResult<()> {
        self.inner.delete(path, version)
    }
    fn exists(&self, path: &str, watch: bool) -> CoordinationResult<Option<NodeStat>> {
        self.inner.exists(path, watch)
    }
    fn get_children(&self, path: &str, watch: bool) -> CoordinationResult<Vec<String>> {
        self.inner.get_children(path, watch)
    }
    fn get_data(&self, path: &str) -> CoordinationResult<Vec<u8>> {
        if !self.vanished.swap(true, Ordering::SeqCst) {
            self.inner.ensemble().delete_node(path)?;
        }
        self.inner.get_data(path)
    }
}

/// Tests a worker leaving between the listing and the read.
///
/// # Purpose
/// A child that vanishes mid-refresh is skipped, not reported as an error.
///
/// # Steps
/// 1. Register three workers.
/// 2. Refresh through a session that deletes the first child it reads.
/// 3. Verify the refresh succeeds with the two remaining addresses.
#[test]
fn test_worker_vanishing_mid_refresh_is_skipped() {
    let ensemble = MemoryEnsemble::new();
    let _workers: Vec<_> = (8081..8084).map(|port| register_worker(&ensemble, port)).collect();

    let (session, _events) = ensemble.connect();
    let registry = ServiceRegistry::new(
        Arc::new(VanishingReadSession {
            inner: session,
            vanished: AtomicBool::new(false),
        }),
        WORKERS_REGISTRY,
    );

    let addresses = registry.update_addresses().unwrap();
    assert_eq!(
        addresses.as_slice(),
        [worker_address(8082), worker_address(8083)]
    );
}

/// Tests reads while the coordination service is unreachable.
///
/// # Purpose
/// The last good snapshot keeps being served; without one the answer is an
/// empty list.
///
/// # Steps
/// 1. Subscribe a leader registry with one worker registered.
/// 2. Expire the leader's session.
/// 3. Verify the cached list is returned and a cold registry returns nothing.
#[test]
fn test_cached_snapshot_survives_disconnect() {
    let ensemble = MemoryEnsemble::new();
    let _worker = register_worker(&ensemble, 8081);
    let (registry, session, _events) = leader_registry(&ensemble);
    registry.subscribe().unwrap();

    ensemble.expire_session(session.session_id());
    assert_eq!(registry.get_addresses().as_slice(), [worker_address(8081)]);
    assert!(registry.update_addresses().is_err());

    let cold = ServiceRegistry::new(Arc::new(session), WORKERS_REGISTRY);
    assert!(cold.get_addresses().is_empty());
}

/// Tests snapshot reads concurrent with refreshes.
///
/// # Purpose
/// Readers only ever observe complete snapshots.
///
/// # Steps
/// 1. Start reader threads that repeatedly take snapshots.
/// 2. Register workers and refresh on the main thread.
/// 3. Verify every observed snapshot is an in-order prefix of the final list.
#[test]
fn test_readers_never_observe_partial_lists() {
    let ensemble = MemoryEnsemble::new();
    let (registry, _session, _events) = leader_registry(&ensemble);
    registry.subscribe().unwrap();
    let expected: Vec<String> = (8081..8101).map(worker_address).collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                (0..200)
                    .map(|_| registry.get_addresses())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut workers = Vec::new();
    for port in 8081..8101 {
        workers.push(register_worker(&ensemble, port));
        registry.update_addresses().unwrap();
    }

    for reader in readers {
        for snapshot in reader.join().unwrap() {
            assert_eq!(snapshot.as_slice(), &expected[..snapshot.len()]);
        }
    }
}

/// Session whose first children listing stalls until the test releases it.
struct StallingListSession {
    inner: MemorySession,
    stalled: AtomicBool,
    listed: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl CoordinationSession for StallingListSession {
    fn session_id(&self) -> SessionId {
        self.inner.session_id()
    }
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
    fn create_sequential_ephemeral(&self, prefix: &str, payload: &[u8]) -> CoordinationResult<String> {
        self.inner.create_sequential_ephemeral(prefix, payload)
    }
    fn create_persistent_if_absent(&self, path: &str) -> CoordinationResult<()> {
        self.inner.create_persistent_if_absent(path)
    }
    fn delete(&self, path: &str, version: Option<i32>) -> CoordinationResult<()> {
        self.inner.delete(path, version)
    }
    fn exists(&self, path: &str, watch: bool) -> CoordinationResult<Option<NodeStat>> {
        self.inner.exists(path, watch)
    }
    fn get_children(&self, path: &str, watch: bool) -> CoordinationResult<Vec<String>> {
        let children = self.inner.get_children(path, watch)?;
        if !self.stalled.swap(true, Ordering::SeqCst) {
            self.listed.wait();
            self.release.wait();
        }
        Ok(children)
    }
    fn get_data(&self, path: &str) -> CoordinationResult<Vec<u8>> {
        self.inner.get_data(path)
    }
}

/// Tests overlapping refreshes.
///
/// # Purpose
/// A slow first-read refresh on a query thread cannot overwrite the snapshot
/// of a refresh triggered by a later join; the newest listing wins.
///
/// # Steps
/// 1. Register one worker and start a first `get_addresses` that stalls right
///    after listing it.
/// 2. Register a second worker and handle the resulting notification on
///    another thread.
/// 3. Release the stalled refresh and verify the cache holds both workers
///    with no notification left pending.
#[test]
fn test_concurrent_refreshes_keep_newest_listing() {
    let ensemble = MemoryEnsemble::new();
    let _first = register_worker(&ensemble, 8081);

    let (session, mut events) = ensemble.connect();
    events.try_recv().unwrap();
    let listed = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let registry = Arc::new(ServiceRegistry::new(
        Arc::new(StallingListSession {
            inner: session,
            stalled: AtomicBool::new(false),
            listed: listed.clone(),
            release: release.clone(),
        }),
        WORKERS_REGISTRY,
    ));

    let query = {
        let registry = registry.clone();
        thread::spawn(move || registry.get_addresses())
    };
    listed.wait();

    let _second = register_worker(&ensemble, 8082);
    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, EventKind::ChildrenChanged);
    let watcher = {
        let registry = registry.clone();
        thread::spawn(move || registry.handle_event(&event))
    };

    thread::sleep(Duration::from_millis(50));
    release.wait();
    query.join().unwrap();
    assert!(watcher.join().unwrap().unwrap().is_some());

    assert_eq!(
        registry.cached_addresses().unwrap().as_slice(),
        [worker_address(8081), worker_address(8082)]
    );
    assert!(events.try_recv().is_err());
    assert_eq!(registry.refresh_count(), 2);
}
