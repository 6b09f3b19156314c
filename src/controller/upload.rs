//! Upload coordinator
//!
//! Takes a snapshot of the pending set, hands it to the ingestor on its own
//! task and reconciles the store with the result. The controller holds the
//! returned handle; while it is held no other upload may start.

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::error::{IngestionError, StoreResult};
use crate::ingest::{IngestResponse, Ingestor};
use crate::store::EventStore;
use crate::types::{Batch, FlushStatus};

/// Final result of one upload task
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UploadResult {
    pub(crate) status: FlushStatus,
}

impl UploadResult {
    /// Result for a task that panicked or was cancelled before reporting
    pub(crate) fn from_join_error(err: JoinError) -> Self {
        let error = IngestionError::Aborted(err.to_string());
        Self {
            status: FlushStatus::Failed {
                error: error.to_string(),
            },
        }
    }
}

/// A delivery attempt that has been dispatched but not yet reconciled
#[derive(Debug)]
pub(crate) struct InFlight {
    pub(crate) attempt: u64,
    pub(crate) batch_size: usize,
    pub(crate) handle: JoinHandle<UploadResult>,
}

#[derive(Clone)]
pub(crate) struct UploadCoordinator {
    store: Arc<dyn EventStore>,
    ingestor: Arc<dyn Ingestor>,
}

impl UploadCoordinator {
    pub(crate) fn new(store: Arc<dyn EventStore>, ingestor: Arc<dyn Ingestor>) -> Self {
        Self { store, ingestor }
    }

    /// Read every pending record as the next batch
    pub(crate) async fn snapshot(&self) -> StoreResult<Batch> {
        Ok(Batch::new(self.store.enumerate_all().await?))
    }

    /// Start delivering `batch` on a separate task
    pub(crate) fn dispatch(&self, attempt: u64, batch: Batch) -> InFlight {
        let batch_size = batch.len();
        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.deliver(attempt, batch).await });

        InFlight {
            attempt,
            batch_size,
            handle,
        }
    }

    /// Call the ingestor once and reconcile the store with its answer
    ///
    /// Only the snapshot's ids are deleted, and only on acknowledgement.
    async fn deliver(&self, attempt: u64, batch: Batch) -> UploadResult {
        let outcome = self
            .ingestor
            .ingest(&batch)
            .await
            .and_then(IngestResponse::into_result);

        let status = match outcome {
            Ok(response) => {
                debug!(attempt, detail = %response.detail, "Batch acknowledged");
                match self.store.delete(&batch.ids()).await {
                    Ok(deleted) => {
                        info!(attempt, deleted, "Batch delivered");
                        FlushStatus::Delivered { deleted }
                    }
                    Err(e) => {
                        // Records stay pending and will be sent again
                        warn!(
                            attempt,
                            error = %e,
                            "Delivered batch could not be removed from store"
                        );
                        FlushStatus::DeliveredNotDeleted {
                            error: e.to_string(),
                        }
                    }
                }
            }
            Err(e) => {
                warn!(attempt, batch_size = batch.len(), error = %e, "Batch delivery failed");
                FlushStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        UploadResult { status }
    }
}
