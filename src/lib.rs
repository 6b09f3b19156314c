//! Event Outbox
//!
//! A durable local outbox for telemetry events: events are persisted as
//! they are enqueued, grouped into batches by pluggable strategies, and
//! delivered through a caller-supplied `Ingestor`. Delivered events are
//! removed; everything else stays on disk and is sent again on a later
//! flush (at-least-once delivery).
//!
//! # Modules
//!
//! - `types`: Event records, batches and flush reports
//! - `store`: Durable keyed store (`FileStore`, `MemoryStore`)
//! - `strategy`: Size and time batching strategies
//! - `ingest`: The ingestion collaborator trait
//! - `controller`: The serialized batch controller and upload coordinator
//! - `config`: Controller configuration
//! - `error`: Error types
//! - `utils`: Durable file helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use event_outbox::{BatchConfig, BatchManager, FileStore, LogIngestor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::default();
//!     let store = Arc::new(FileStore::open(config.file_store_config())?);
//!     let manager = BatchManager::start(config, store, Arc::new(LogIngestor)).await?;
//!
//!     manager.add_event(&serde_json::json!({"event": "app_open"})).await?;
//!     manager.flush(true).await?;
//!     manager.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod ingest;
pub mod store;
pub mod strategy;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::BatchConfig;
pub use controller::{BatchManager, ControllerStatus};
pub use error::{BatchError, BatchResult, IngestionError, StoreError, StoreResult};
pub use ingest::{IngestResponse, Ingestor, LogIngestor};
pub use store::{EventStore, FileStore, FileStoreConfig, MemoryStore};
pub use strategy::{FlushStrategy, QueueSignals, SizeStrategy, TimeStrategy};
pub use types::{Batch, EventId, EventRecord, FlushOutcome, FlushReport, FlushStatus, SkipReason};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
