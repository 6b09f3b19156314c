//! Event Outbox - Binary Entry Point
//!
//! `outbox-pipe` reads newline-delimited JSON from stdin and enqueues each
//! value. Batches are delivered through `LogIngestor`. On EOF or Ctrl+C the
//! remaining events are flushed before exit.

use std::sync::Arc;

use event_outbox::{BatchConfig, BatchManager, FileStore, LogIngestor};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays usable in a pipeline
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = BatchConfig::from_env()?;
    info!(
        size_threshold = config.size_threshold,
        time_interval_ms = config.time_interval.as_millis() as u64,
        data_dir = %config.data_dir.display(),
        "Starting outbox"
    );

    let store = Arc::new(FileStore::open(config.file_store_config())?);
    let manager = BatchManager::start(config, store, Arc::new(LogIngestor)).await?;

    let (stop_tx, mut stop_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    })?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                info!("Interrupted, flushing pending events");
                break;
            }

            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => match serde_json::from_str::<serde_json::Value>(&line) {
                        Ok(value) => {
                            let id = manager.add_event(&value).await?;
                            debug!(event_id = %id, "Enqueued");
                        }
                        Err(e) => warn!(error = %e, "Skipping line that is not JSON"),
                    },
                    None => break,
                }
            }
        }
    }

    let outcome = manager.flush(true).await?;
    info!(?outcome, "Final flush requested");
    manager.shutdown().await?;

    Ok(())
}
