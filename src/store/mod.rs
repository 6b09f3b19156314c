//! Durable Event Store
//!
//! The outbox keeps every pending record in a keyed store until its
//! delivery is acknowledged:
//! - `EventStore`: the backend contract (put, enumerate-all, delete)
//! - `FileStore`: append-only JSONL operation log with fsync and compaction
//! - `MemoryStore`: non-durable backend with failure injection for tests
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌───────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ put /     │───►│ append line  │───►│ update index │───►│ compact when │
//! │ delete    │    │ + fsync      │    │ (in memory)  │    │ mostly dead  │
//! └───────────┘    └──────────────┘    └──────────────┘    └──────────────┘
//!
//! Read Path (Startup):
//! ┌──────────────────┐    ┌─────────────────┐
//! │ Replay put/delete│───►│ Live index      │───► Ready!
//! │ lines (skip torn)│    │ (insert order)  │
//! └──────────────────┘    └─────────────────┘
//! ```

mod file;
mod index;
mod memory;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{EventId, EventRecord};

pub use file::{FileStore, FileStoreConfig};
pub use memory::MemoryStore;

/// Backend contract for the durable pending set
///
/// Implementations must be safe to call from any task and must serialize
/// their own writes. Every mutation is atomic: on error, the previously
/// committed state is unchanged.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Durably store a record under its identifier
    ///
    /// Returns only once the write is durable.
    async fn put(&self, record: EventRecord) -> StoreResult<EventId>;

    /// Snapshot of every stored record
    ///
    /// No record appears twice or is skipped within one call.
    async fn enumerate_all(&self) -> StoreResult<Vec<EventRecord>>;

    /// Durably remove exactly the given identifiers
    ///
    /// Unknown identifiers are ignored. Returns the number removed.
    async fn delete(&self, ids: &[EventId]) -> StoreResult<usize>;

    /// Number of stored records
    async fn len(&self) -> StoreResult<usize> {
        Ok(self.enumerate_all().await?.len())
    }
}
