//! Top-level controller composition.
//!
//! Wires the store, topology graph, peer pool and election primitive into
//! one instance. All collaborators are passed at construction; there are no
//! ambient singletons.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::builder::RequestBuilder;
use crate::config::Config;
use crate::election::{ElectionGuard, MasterElection};
use crate::graph::TopologyGraph;
use crate::rpc::{Gateway, PeerPool};
use crate::store::ResourceStore;
use crate::tracker::LifecycleTracker;
use crate::watcher::EventWatcher;

/// The packet-injection controller.
///
/// Only the elected instance consumes store events and holds expiration
/// timers; the election guard flips those on and off as the role changes.
pub struct Controller {
    election: Arc<dyn MasterElection>,
    guard: Arc<ElectionGuard>,
    tracking_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl Controller {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        graph: Arc<dyn TopologyGraph>,
        pool: Arc<dyn PeerPool>,
        election: Arc<dyn MasterElection>,
        config: &Config,
    ) -> Self {
        let gateway = Arc::new(Gateway::new(pool, config.request_timeout));
        let builder = RequestBuilder::new(graph.clone());
        let tracker = Arc::new(LifecycleTracker::new(
            store.clone(),
            graph,
            gateway.clone(),
        ));
        let (tracking_tx, tracking_rx) = mpsc::unbounded_channel();
        let watcher = Arc::new(EventWatcher::new(
            store,
            builder,
            gateway,
            tracker.clone(),
            tracking_tx,
        ));
        let guard = Arc::new(ElectionGuard::new(watcher, tracker));
        election.add_listener(guard.clone());

        Self {
            election,
            guard,
            tracking_rx: Mutex::new(Some(tracking_rx)),
        }
    }

    /// Receiver of tracking tokens, one per processed submission (empty on
    /// rejection). Can be taken once.
    pub fn tracking_tokens(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.tracking_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Join the election; the guard starts the watcher and reconciliation
    /// once a master role is granted.
    pub fn start(&self) {
        self.election.start_and_wait();
    }

    /// Stop watching and leave the election.
    pub fn stop(&self) {
        self.guard.release();
        self.election.stop();
    }

    pub fn is_master(&self) -> bool {
        self.election.is_master()
    }
}
