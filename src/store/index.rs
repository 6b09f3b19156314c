//! In-memory index of pending records
//!
//! Both store backends keep their live set here. Records are ordered by
//! an internal insertion sequence so enumeration is stable and matches
//! enqueue order.

use std::collections::{BTreeMap, HashMap};

use crate::types::{EventId, EventRecord};

#[derive(Debug, Default)]
pub(crate) struct PendingIndex {
    records: BTreeMap<u64, EventRecord>,
    by_id: HashMap<EventId, u64>,
    next_seq: u64,
}

impl PendingIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a record; a repeated id keeps its original position
    pub(crate) fn insert(&mut self, record: EventRecord) {
        if let Some(seq) = self.by_id.get(&record.id) {
            self.records.insert(*seq, record);
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_id.insert(record.id, seq);
        self.records.insert(seq, record);
    }

    /// Remove the given ids, returning how many were present
    pub(crate) fn remove(&mut self, ids: &[EventId]) -> usize {
        let mut removed = 0;
        for id in ids {
            if let Some(seq) = self.by_id.remove(id) {
                self.records.remove(&seq);
                removed += 1;
            }
        }
        removed
    }

    pub(crate) fn contains(&self, id: &EventId) -> bool {
        self.by_id.contains_key(id)
    }

    /// The subset of `ids` currently stored, deduplicated, in argument order
    pub(crate) fn present(&self, ids: &[EventId]) -> Vec<EventId> {
        let mut seen = std::collections::HashSet::new();
        ids.iter()
            .filter(|id| self.contains(id) && seen.insert(**id))
            .copied()
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<EventRecord> {
        self.records.values().cloned().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
