//! Injection resource store contract.
//!
//! The controller needs create/update/delete notifications and an index of
//! current records; persistence itself lives behind this boundary.
//! `MemoryStore` is the in-process implementation backing the daemon and
//! tests.

mod memory;

pub use memory::MemoryStore;

use tokio::sync::broadcast;

use crate::domain::Injection;

/// Store notification kinds. `Expire` is emitted by backends that age
/// records out (TTL-style); the controller treats it like `Delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    Create,
    Set,
    Expire,
    Delete,
}

/// One lifecycle notification with a snapshot of the record.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub action: StoreAction,
    pub id: String,
    pub resource: Injection,
}

/// Resource store boundary.
///
/// `delete` must be idempotent and safe under concurrent invocation for the
/// same id; the second call is a no-op returning `false`.
pub trait ResourceStore: Send + Sync {
    /// Snapshot of all current records.
    fn index(&self) -> Vec<Injection>;

    fn get(&self, id: &str) -> Option<Injection>;

    /// Insert a new record, notifying watchers with `Create`.
    fn create(&self, record: Injection);

    /// Replace a record, notifying watchers with `Set`.
    fn update(&self, id: &str, record: Injection);

    /// Remove a record, notifying watchers with `Delete`. Returns whether a
    /// record was actually removed.
    fn delete(&self, id: &str) -> bool;

    /// Subscribe to lifecycle notifications.
    fn watch(&self) -> broadcast::Receiver<StoreEvent>;
}
