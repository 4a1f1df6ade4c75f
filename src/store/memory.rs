//! In-memory resource store with broadcast notifications.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use super::{ResourceStore, StoreAction, StoreEvent};
use crate::domain::Injection;

/// Capacity of the notification ring; a lagging watcher logs and resyncs.
const EVENT_CAPACITY: usize = 256;

pub struct MemoryStore {
    records: RwLock<HashMap<String, Injection>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            records: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Age a record out, notifying watchers with `Expire`. Backend-driven
    /// TTL surfaces this way; idempotent like `delete`.
    pub fn expire(&self, id: &str) -> bool {
        let removed = self
            .records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        match removed {
            Some(resource) => {
                self.notify(StoreAction::Expire, id, resource);
                true
            }
            None => false,
        }
    }

    fn notify(&self, action: StoreAction, id: &str, resource: Injection) {
        // A send error only means nobody is watching.
        let _ = self.events.send(StoreEvent {
            action,
            id: id.to_string(),
            resource,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStore for MemoryStore {
    fn index(&self) -> Vec<Injection> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    fn get(&self, id: &str) -> Option<Injection> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    fn create(&self, record: Injection) {
        let id = record.uuid.clone();
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), record.clone());
        self.notify(StoreAction::Create, &id, record);
    }

    fn update(&self, id: &str, record: Injection) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), record.clone());
        self.notify(StoreAction::Set, id, record);
    }

    fn delete(&self, id: &str) -> bool {
        let removed = self
            .records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        match removed {
            Some(resource) => {
                self.notify(StoreAction::Delete, id, resource);
                true
            }
            None => false,
        }
    }

    fn watch(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PacketType;
    use std::sync::Arc;

    fn record(id: &str) -> Injection {
        Injection::new(id, PacketType::Icmp4)
    }

    #[test]
    fn create_and_index() {
        let store = MemoryStore::new();
        store.create(record("a"));
        store.create(record("b"));

        let mut ids: Vec<String> = store.index().into_iter().map(|r| r.uuid).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(store.get("a").is_some());
        assert!(store.get("c").is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.create(record("a"));

        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert!(!store.delete("never-existed"));
    }

    #[test]
    fn expire_is_idempotent() {
        let store = MemoryStore::new();
        store.create(record("a"));

        assert!(store.expire("a"));
        assert!(!store.expire("a"));
    }

    #[tokio::test]
    async fn watchers_see_the_full_lifecycle() {
        let store = MemoryStore::new();
        let mut rx = store.watch();

        store.create(record("a"));
        let mut updated = record("a");
        updated.tracking_id = Some("t-1".to_string());
        store.update("a", updated);
        store.delete("a");

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.action, StoreAction::Create);
        assert_eq!(ev.id, "a");

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.action, StoreAction::Set);
        assert_eq!(ev.resource.tracking_id.as_deref(), Some("t-1"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.action, StoreAction::Delete);
    }

    #[tokio::test]
    async fn expire_notifies_with_expire_action() {
        let store = MemoryStore::new();
        store.create(record("a"));
        let mut rx = store.watch();

        store.expire("a");
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.action, StoreAction::Expire);
    }

    #[test]
    fn concurrent_deletes_remove_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        store.create(record("a"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || store.delete("a")));
        }

        let removed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|deleted| *deleted)
            .count();
        assert_eq!(removed, 1);
        assert!(store.get("a").is_none());
    }
}
