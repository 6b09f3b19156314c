//! Event record types for the outbox
//!
//! Records are immutable once stored. Only their presence in the store
//! changes: they are written on enqueue and removed after acknowledged delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier assigned to a record at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pending event: opaque payload plus system-assigned identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Identifier assigned by the batch controller
    pub id: EventId,

    /// When the record was accepted into the outbox
    #[serde(rename = "enqueuedAt")]
    pub enqueued_at: DateTime<Utc>,

    /// Caller-supplied payload, never inspected by the outbox
    pub payload: serde_json::Value,
}

impl EventRecord {
    /// Create a record with a fresh identifier and the current time
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            enqueued_at: Utc::now(),
            payload,
        }
    }

    /// Create a record with explicit identity (for replay and tests)
    pub fn with_id(id: EventId, enqueued_at: DateTime<Utc>, payload: serde_json::Value) -> Self {
        Self {
            id,
            enqueued_at,
            payload,
        }
    }
}

/// A snapshot of pending records chosen for one delivery attempt
///
/// Only the identifiers captured here are deleted when the delivery
/// is acknowledged; records stored afterwards are never touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    records: Vec<EventRecord>,
}

impl Batch {
    /// Build a batch from a store snapshot
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Identifiers in snapshot order
    pub fn ids(&self) -> Vec<EventId> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// Payloads in snapshot order
    pub fn payloads(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.records.iter().map(|r| &r.payload)
    }

    /// Full records in snapshot order
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Enqueue time of the oldest record in the batch
    pub fn oldest_enqueued_at(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.enqueued_at).min()
    }
}
