//! Leader election consumer contract.
//!
//! The controller never implements consensus; it registers a listener with
//! an opaque election primitive and reacts to role changes. Exclusivity is
//! treated as best-effort: everything the master does is idempotent, so a
//! brief overlap during failover is harmless.

use std::sync::{Arc, Mutex, RwLock};

use tracing::info;

use crate::tracker::LifecycleTracker;
use crate::watcher::{EventWatcher, WatcherHandle};

/// Election role of one controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Candidate,
    Master,
    Slave,
}

/// Callbacks fired by the election primitive. The start variants are
/// reached once at process start; the switch variants on every failover.
pub trait ElectionListener: Send + Sync {
    fn on_start_as_master(&self);
    fn on_start_as_slave(&self);
    fn on_switch_to_master(&self);
    fn on_switch_to_slave(&self);
}

/// Election primitive boundary.
pub trait MasterElection: Send + Sync {
    /// Join the election and block until an initial role is known.
    fn start_and_wait(&self);
    fn stop(&self);
    fn add_listener(&self, listener: Arc<dyn ElectionListener>);
    fn role(&self) -> Role;

    fn is_master(&self) -> bool {
        self.role() == Role::Master
    }
}

/// Scripted election for single-node deployments and tests: the initial
/// role is fixed and failovers are driven by `promote`/`demote`.
pub struct ManualElection {
    /// Election resource name shared by all replicas contending for it.
    name: String,
    role: RwLock<Role>,
    initial_master: bool,
    listeners: RwLock<Vec<Arc<dyn ElectionListener>>>,
}

impl ManualElection {
    pub fn new(name: impl Into<String>, initial_master: bool) -> Self {
        Self {
            name: name.into(),
            role: RwLock::new(Role::Candidate),
            initial_master,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn listeners(&self) -> Vec<Arc<dyn ElectionListener>> {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_role(&self, role: Role) {
        *self.role.write().unwrap_or_else(|e| e.into_inner()) = role;
    }

    /// Grant mastership to this instance.
    pub fn promote(&self) {
        if self.role() == Role::Master {
            return;
        }
        self.set_role(Role::Master);
        for listener in self.listeners() {
            listener.on_switch_to_master();
        }
    }

    /// Revoke mastership from this instance.
    pub fn demote(&self) {
        if self.role() == Role::Slave {
            return;
        }
        self.set_role(Role::Slave);
        for listener in self.listeners() {
            listener.on_switch_to_slave();
        }
    }
}

impl MasterElection for ManualElection {
    fn start_and_wait(&self) {
        if self.initial_master {
            info!("Election '{}': starting as master", self.name);
            self.set_role(Role::Master);
            for listener in self.listeners() {
                listener.on_start_as_master();
            }
        } else {
            info!("Election '{}': starting as slave", self.name);
            self.set_role(Role::Slave);
            for listener in self.listeners() {
                listener.on_start_as_slave();
            }
        }
    }

    fn stop(&self) {
        self.set_role(Role::Candidate);
    }

    fn add_listener(&self, listener: Arc<dyn ElectionListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    fn role(&self) -> Role {
        *self.role.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Bridges election callbacks to the controller's components: only the
/// elected instance runs the watcher and holds expiration timers.
pub struct ElectionGuard {
    watcher: Arc<EventWatcher>,
    tracker: Arc<LifecycleTracker>,
    active: Mutex<Option<WatcherHandle>>,
}

impl ElectionGuard {
    pub fn new(watcher: Arc<EventWatcher>, tracker: Arc<LifecycleTracker>) -> Self {
        Self {
            watcher,
            tracker,
            active: Mutex::new(None),
        }
    }

    fn become_master(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.is_some() {
            return;
        }
        info!("Elected master, reconciling persisted injections");
        self.tracker.reconcile();
        *active = Some(self.watcher.clone().start());
    }

    fn become_slave(&self) {
        let handle = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            info!("Lost mastership, stopping the event watcher");
            handle.stop();
        }
    }

    /// Stop watching regardless of role; used on controller shutdown.
    pub fn release(&self) {
        self.become_slave();
    }
}

impl ElectionListener for ElectionGuard {
    fn on_start_as_master(&self) {
        self.become_master();
    }

    fn on_start_as_slave(&self) {
        // A slave holds no timers and watches nothing.
        self.become_slave();
    }

    fn on_switch_to_master(&self) {
        self.become_master();
    }

    fn on_switch_to_slave(&self) {
        self.become_slave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        start_master: AtomicUsize,
        start_slave: AtomicUsize,
        to_master: AtomicUsize,
        to_slave: AtomicUsize,
    }

    impl ElectionListener for CountingListener {
        fn on_start_as_master(&self) {
            self.start_master.fetch_add(1, Ordering::SeqCst);
        }
        fn on_start_as_slave(&self) {
            self.start_slave.fetch_add(1, Ordering::SeqCst);
        }
        fn on_switch_to_master(&self) {
            self.to_master.fetch_add(1, Ordering::SeqCst);
        }
        fn on_switch_to_slave(&self) {
            self.to_slave.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn initial_master_fires_the_start_callback() {
        let election = ManualElection::new("pi-test", true);
        let listener = Arc::new(CountingListener::default());
        election.add_listener(listener.clone());

        election.start_and_wait();
        assert!(election.is_master());
        assert_eq!(election.name(), "pi-test");
        assert_eq!(listener.start_master.load(Ordering::SeqCst), 1);
        assert_eq!(listener.start_slave.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failover_fires_switch_callbacks_once() {
        let election = ManualElection::new("pi-test", false);
        let listener = Arc::new(CountingListener::default());
        election.add_listener(listener.clone());

        election.start_and_wait();
        assert_eq!(election.role(), Role::Slave);

        election.promote();
        election.promote();
        assert_eq!(listener.to_master.load(Ordering::SeqCst), 1);

        election.demote();
        election.demote();
        assert_eq!(listener.to_slave.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_returns_to_candidate() {
        let election = ManualElection::new("pi-test", true);
        election.start_and_wait();
        election.stop();
        assert_eq!(election.role(), Role::Candidate);
    }
}
