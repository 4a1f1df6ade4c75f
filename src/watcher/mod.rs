//! Store event consumption.
//!
//! The watcher turns resource notifications into controller actions:
//! create/set dispatches the injection, expire/delete stops a still-running
//! one. Operations for one id are ordered by the event stream; different
//! ids interleave freely.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::builder::RequestBuilder;
use crate::domain::Injection;
use crate::rpc::Gateway;
use crate::store::{ResourceStore, StoreAction, StoreEvent};
use crate::tracker::LifecycleTracker;

/// Handle to a running watcher task.
pub struct WatcherHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn stop(self) {
        self.shutdown.notify_one();
        self.task.abort();
    }
}

/// Consumes injection store events on the elected controller.
pub struct EventWatcher {
    store: Arc<dyn ResourceStore>,
    builder: RequestBuilder,
    gateway: Arc<Gateway>,
    tracker: Arc<LifecycleTracker>,
    /// Synchronous callers wait here for the tracking token of the request
    /// they just submitted; rejections publish an empty token.
    tracking_tx: mpsc::UnboundedSender<String>,
}

impl EventWatcher {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        builder: RequestBuilder,
        gateway: Arc<Gateway>,
        tracker: Arc<LifecycleTracker>,
        tracking_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            store,
            builder,
            gateway,
            tracker,
            tracking_tx,
        }
    }

    /// Subscribe to the store and start consuming events until stopped.
    pub fn start(self: Arc<Self>) -> WatcherHandle {
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();
        let mut events = self.store.watch();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    event = events.recv() => match event {
                        Ok(event) => self.handle_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!("Watcher lagged, {} events dropped", missed);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        WatcherHandle { shutdown, task }
    }

    async fn handle_event(&self, event: StoreEvent) {
        debug!("New watcher event {:?} for {}", event.action, event.id);
        match event.action {
            StoreAction::Create | StoreAction::Set => self.dispatch(event.resource).await,
            StoreAction::Expire | StoreAction::Delete => self.retire(event.resource).await,
        }
    }

    /// Resolve, dispatch and start tracking a new injection. Any failure
    /// rejects the request: empty token to the waiter, record deleted.
    async fn dispatch(&self, record: Injection) {
        if record.tracking_id.is_some() || record.start_time.is_some() {
            // Already dispatched; this is our own tracking persistence or
            // a replica overlap. Either way, nothing to do.
            return;
        }

        let (host, params) = match self.builder.resolve(&record) {
            Ok(resolved) => resolved,
            Err(e) => {
                let _ = self.tracking_tx.send(String::new());
                error!("Not able to parse request: {}", e);
                self.store.delete(&record.uuid);
                return;
            }
        };

        let tracking_id = match self.gateway.inject(&host, &params).await {
            Ok(tracking_id) => tracking_id,
            Err(e) => {
                let _ = self.tracking_tx.send(String::new());
                error!("Not able to inject on host {} :: {}", host, e);
                self.store.delete(&record.uuid);
                return;
            }
        };

        // Persist before publishing so a waiter holding the token always
        // finds the running record.
        self.tracker.track(record, tracking_id.clone());
        let _ = self.tracking_tx.send(tracking_id);
    }

    /// Stop a still-running injection that was deleted or aged out. A record
    /// that already ran its course needs nothing.
    async fn retire(&self, record: Injection) {
        if !record.is_running(Utc::now()) {
            return;
        }

        self.tracker.send_stop(&record).await;
        // Expire notifications remove the record backend-side; an explicit
        // delete already did. This is a no-op then, but covers stores that
        // only notify.
        self.store.delete(&record.uuid);
    }
}
