//! Shared test doubles for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use event_outbox::{Batch, BatchConfig, IngestResponse, IngestionError, Ingestor};
use tokio::sync::{Notify, Semaphore};

/// Config whose strategies only fire on size, never on time
pub fn size_only_config(size_threshold: usize) -> BatchConfig {
    BatchConfig::new(size_threshold, Duration::from_secs(3600))
        .with_tick_interval(Duration::from_secs(3600))
}

/// Scripted ingestor
///
/// Records every batch it sees. When `gated`, each call waits for a permit
/// on `release` so tests can hold a delivery in flight.
pub struct ScriptedIngestor {
    batches: parking_lot::Mutex<Vec<Batch>>,
    fail: AtomicBool,
    gated: bool,
    pub release: Semaphore,
    pub started: Notify,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedIngestor {
    pub fn immediate() -> Self {
        Self::build(false)
    }

    pub fn gated() -> Self {
        Self::build(true)
    }

    fn build(gated: bool) -> Self {
        Self {
            batches: parking_lot::Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            gated,
            release: Semaphore::new(0),
            started: Notify::new(),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().clone()
    }

    /// Highest number of overlapping ingest calls observed
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ingestor for ScriptedIngestor {
    async fn ingest(&self, batch: &Batch) -> Result<IngestResponse, IngestionError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.batches.lock().push(batch.clone());
        self.started.notify_one();

        if self.gated {
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            Ok(IngestResponse::rejected("503 Service Unavailable"))
        } else {
            Ok(IngestResponse::acknowledged("200 OK"))
        }
    }
}
