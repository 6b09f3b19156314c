//! Ingestion collaborator
//!
//! The outbox never talks to the network itself. A caller supplies an
//! `Ingestor` that turns a batch into whatever wire format and transport
//! it needs, and reports whether delivery was acknowledged.

use async_trait::async_trait;
use tracing::info;

use crate::error::IngestionError;
use crate::types::Batch;

/// Answer from the transport for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestResponse {
    /// True when the remote side acknowledged delivery
    pub success: bool,
    /// Transport-specific status, e.g. "200 OK"
    pub detail: String,
}

impl IngestResponse {
    pub fn acknowledged(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
        }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }

    /// Collapse a non-success response into an error
    pub fn into_result(self) -> Result<IngestResponse, IngestionError> {
        if self.success {
            Ok(self)
        } else {
            Err(IngestionError::Rejected(self.detail))
        }
    }
}

/// Delivers a batch to the ingestion service
///
/// Called at most once at a time per controller, always with a non-empty
/// batch. Timeouts are the implementation's responsibility and should be
/// reported as `IngestionError::Timeout`.
#[async_trait]
pub trait Ingestor: Send + Sync + 'static {
    async fn ingest(&self, batch: &Batch) -> Result<IngestResponse, IngestionError>;
}

/// Ingestor that logs each batch and acknowledges it
///
/// Useful as a sink while wiring up a real transport.
#[derive(Debug, Default, Clone)]
pub struct LogIngestor;

#[async_trait]
impl Ingestor for LogIngestor {
    async fn ingest(&self, batch: &Batch) -> Result<IngestResponse, IngestionError> {
        for record in batch.records() {
            info!(event_id = %record.id, payload = %record.payload, "Ingesting event");
        }
        Ok(IngestResponse::acknowledged(format!("logged {} events", batch.len())))
    }
}
