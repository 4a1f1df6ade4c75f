//! Running/expired lifecycle tracking.
//!
//! Each dispatched injection gets one detached timer for its send window.
//! There is no cancel primitive: a timer that fires after the record was
//! already removed is a no-op, which is what makes explicit stops, duplicate
//! deletes and brief master overlap all safe.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::Injection;
use crate::graph::TopologyGraph;
use crate::resolver::NodeResolver;
use crate::rpc::Gateway;
use crate::store::ResourceStore;

pub struct LifecycleTracker {
    store: Arc<dyn ResourceStore>,
    graph: Arc<dyn TopologyGraph>,
    gateway: Arc<Gateway>,
}

impl LifecycleTracker {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        graph: Arc<dyn TopologyGraph>,
        gateway: Arc<Gateway>,
    ) -> Self {
        Self {
            store,
            graph,
            gateway,
        }
    }

    /// Transition Pending → Running: persist the tracking token and start
    /// time, then schedule the expiration timer. Replay injections have no
    /// send window and never get a timer.
    pub fn track(self: &Arc<Self>, mut record: Injection, tracking_id: String) {
        record.tracking_id = Some(tracking_id);
        record.start_time = Some(Utc::now());
        let id = record.uuid.clone();
        let window = record.total_duration();
        let replay = record.is_replay();
        self.store.update(&id, record);

        if !replay {
            self.schedule_expiration(id, window);
        }
    }

    /// Arm one detached expiration timer.
    pub fn schedule_expiration(self: &Arc<Self>, id: String, delay: Duration) {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracker.expire(&id).await;
        });
    }

    /// Retire an injection whose send window has elapsed: best-effort stop
    /// to the owning agent, then remove the record. No-op if the record is
    /// already gone.
    pub async fn expire(&self, id: &str) {
        let Some(record) = self.store.get(id) else {
            debug!("Expiration fired for {} but the record is gone", id);
            return;
        };

        // Persist a tracking-free snapshot first: the delete notification
        // then reads as already retired and the watcher does not stop the
        // injection a second time. The start time stays, keeping the record
        // out of the dispatch path.
        if record.tracking_id.is_some() {
            let mut retired = record.clone();
            retired.tracking_id = None;
            self.store.update(id, retired);
        }

        self.send_stop(&record).await;
        self.store.delete(id);
    }

    /// Send a stop request for a dispatched injection. Failures are logged
    /// and swallowed; a stop is best-effort once the local deadline passed.
    pub async fn send_stop(&self, record: &Injection) {
        let Some(tracking_id) = record.tracking_id.as_deref() else {
            return;
        };

        let resolver = NodeResolver::new(&*self.graph);
        let Some(node) = resolver.resolve_node(record.src.as_deref()) else {
            debug!(
                "No source node for {} anymore, skipping stop request",
                record.uuid
            );
            return;
        };

        if let Err(e) = self.gateway.stop(&node.host, tracking_id).await {
            warn!("Stop request for {} failed: {}", record.uuid, e);
        }
    }

    /// Restart reconciliation: re-evaluate every persisted record. Running
    /// ones get a timer for the remaining window; everything else is retired
    /// immediately. No injection survives a controller crash forever.
    pub fn reconcile(self: &Arc<Self>) {
        let now = Utc::now();
        for record in self.store.index() {
            if record.is_running(now) {
                if record.is_replay() {
                    // Terminates only via explicit stop.
                    continue;
                }
                let elapsed = now
                    .signed_duration_since(record.start_time.unwrap_or(now))
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                let remaining = record.total_duration().saturating_sub(elapsed);
                debug!(
                    "Rescheduling expiration of {} in {:?}",
                    record.uuid, remaining
                );
                self.schedule_expiration(record.uuid, remaining);
            } else {
                debug!("Retiring {} left over from a previous run", record.uuid);
                self.schedule_expiration(record.uuid, Duration::ZERO);
            }
        }
    }
}
