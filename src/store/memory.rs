//! In-memory store backend
//!
//! Not durable across restarts. Used by tests and by embedders that only
//! want the batching behaviour. Failures can be injected per operation.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::index::PendingIndex;
use super::EventStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{EventId, EventRecord};

#[derive(Debug, Default)]
pub struct MemoryStore {
    index: Mutex<PendingIndex>,
    fail_puts: AtomicBool,
    fail_enumerate: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent put fail until reset
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent enumeration fail until reset
    pub fn set_fail_enumerate(&self, fail: bool) {
        self.fail_enumerate.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent delete fail until reset
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Check whether a record is currently stored
    pub fn contains(&self, id: &EventId) -> bool {
        self.index.lock().contains(id)
    }

    fn check(flag: &AtomicBool, op: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn put(&self, record: EventRecord) -> StoreResult<EventId> {
        Self::check(&self.fail_puts, "put")?;
        let id = record.id;
        self.index.lock().insert(record);
        Ok(id)
    }

    async fn enumerate_all(&self) -> StoreResult<Vec<EventRecord>> {
        Self::check(&self.fail_enumerate, "enumerate")?;
        Ok(self.index.lock().snapshot())
    }

    async fn delete(&self, ids: &[EventId]) -> StoreResult<usize> {
        Self::check(&self.fail_deletes, "delete")?;
        Ok(self.index.lock().remove(ids))
    }

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.index.lock().len())
    }
}
