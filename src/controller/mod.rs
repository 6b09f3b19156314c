//! Batch Controller
//!
//! All pending-set bookkeeping and the upload state live on one tokio task.
//! Callers talk to it through a cloneable `BatchManager` handle; every
//! request is a message, so enqueues and flush decisions never race.
//!
//! ```text
//! add_event ──┐                       ┌──► store.put ──► reply ──► evaluate
//! flush ──────┼──► mpsc ──► actor ────┤
//! tick ───────┘                       └──► evaluate ──► snapshot ──► spawn upload
//!                                                                       │
//!              actor ◄── upload handle resolves (clears upload state) ◄─┘
//! ```
//!
//! State machine: `Idle → Evaluating → (no-op | Flushing) → Idle`. A flush
//! request while an upload is in flight is answered with
//! `Skipped { reason: InFlight }`.

mod upload;

use std::future::pending;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::BatchConfig;
use crate::error::{BatchError, BatchResult};
use crate::ingest::Ingestor;
use crate::store::EventStore;
use crate::strategy::{first_triggered, FlushStrategy, QueueSignals, SizeStrategy, TimeStrategy};
use crate::types::{EventId, EventRecord, FlushOutcome, FlushReport, FlushStatus, SkipReason};

use upload::{InFlight, UploadCoordinator, UploadResult};

/// Point-in-time view of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus {
    pub signals: QueueSignals,
    /// True while a delivery attempt is in flight
    pub flushing: bool,
}

enum Command {
    AddEvent {
        payload: serde_json::Value,
        reply: oneshot::Sender<BatchResult<EventId>>,
    },
    Flush {
        forced: bool,
        reply: oneshot::Sender<BatchResult<FlushOutcome>>,
    },
    Status {
        reply: oneshot::Sender<ControllerStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running batch controller
#[derive(Clone)]
pub struct BatchManager {
    tx: mpsc::Sender<Command>,
    reports: broadcast::Sender<FlushReport>,
}

impl BatchManager {
    /// Start a controller with the size and time strategies from `config`
    pub async fn start(
        config: BatchConfig,
        store: Arc<dyn EventStore>,
        ingestor: Arc<dyn Ingestor>,
    ) -> BatchResult<Self> {
        let strategies: Vec<Box<dyn FlushStrategy>> = vec![
            Box::new(SizeStrategy::new(config.size_threshold)),
            Box::new(TimeStrategy::new(config.time_interval)),
        ];
        Self::start_with_strategies(config, store, ingestor, strategies).await
    }

    /// Start a controller with a custom set of strategies
    ///
    /// Records already in the store from a previous run count as pending.
    pub async fn start_with_strategies(
        config: BatchConfig,
        store: Arc<dyn EventStore>,
        ingestor: Arc<dyn Ingestor>,
        strategies: Vec<Box<dyn FlushStrategy>>,
    ) -> BatchResult<Self> {
        config.validate()?;

        let existing = store.enumerate_all().await?;
        let oldest_pending = existing.iter().map(|r| r.enqueued_at).min();
        if !existing.is_empty() {
            info!(pending = existing.len(), "Recovered pending events from store");
        }

        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let (reports, _) = broadcast::channel(config.report_capacity);

        let controller = Controller {
            tick_interval: config.tick_interval,
            strategies,
            store: Arc::clone(&store),
            coordinator: UploadCoordinator::new(store, ingestor),
            reports: reports.clone(),
            pending: existing.len(),
            oldest_pending,
            oldest_since_snapshot: None,
            last_flush: Instant::now(),
            attempts: 0,
            in_flight: None,
        };
        tokio::spawn(controller.run(rx));

        Ok(Self { tx, reports })
    }

    /// Persist an event and evaluate the batching strategies
    ///
    /// Resolves once the record is durable. Whether a flush follows does not
    /// affect the result; delivery failures are only visible via `subscribe`.
    pub async fn add_event<T: Serialize + ?Sized>(&self, payload: &T) -> BatchResult<EventId> {
        let payload = serde_json::to_value(payload)?;
        self.request(|reply| Command::AddEvent { payload, reply })
            .await?
    }

    /// Request a flush
    ///
    /// A forced flush ignores the strategies. Either way an empty pending
    /// set never reaches the ingestor.
    pub async fn flush(&self, forced: bool) -> BatchResult<FlushOutcome> {
        self.request(|reply| Command::Flush { forced, reply }).await?
    }

    /// Current queue signals and upload state
    pub async fn status(&self) -> BatchResult<ControllerStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Number of records pending delivery
    pub async fn pending_count(&self) -> BatchResult<usize> {
        Ok(self.status().await?.signals.pending_count)
    }

    /// Receive a report after every delivery attempt
    pub fn subscribe(&self) -> broadcast::Receiver<FlushReport> {
        self.reports.subscribe()
    }

    /// Stop the controller, waiting for any in-flight upload to finish
    ///
    /// Pending records stay in the store for the next run.
    pub async fn shutdown(&self) -> BatchResult<()> {
        match self.request(|reply| Command::Shutdown { reply }).await {
            Ok(()) | Err(BatchError::Closed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> BatchResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| BatchError::Closed)?;
        rx.await.map_err(|_| BatchError::Closed)
    }
}

/// The actor: sole owner of pending bookkeeping and the upload state
struct Controller {
    tick_interval: Duration,
    strategies: Vec<Box<dyn FlushStrategy>>,
    store: Arc<dyn EventStore>,
    coordinator: UploadCoordinator,
    reports: broadcast::Sender<FlushReport>,
    pending: usize,
    oldest_pending: Option<DateTime<Utc>>,
    /// Oldest record stored after the in-flight snapshot was taken
    oldest_since_snapshot: Option<DateTime<Utc>>,
    last_flush: Instant,
    attempts: u64,
    /// Upload state: `Some` from snapshot until the result is reconciled
    in_flight: Option<InFlight>,
}

impl Controller {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let mut timer = interval(self.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                joined = join_upload(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.finish_upload(joined);
                }

                _ = timer.tick() => {
                    if let Err(e) = self.evaluate(false).await {
                        warn!(error = %e, "Scheduled flush failed");
                    }
                }

                command = rx.recv() => {
                    match command {
                        Some(Command::AddEvent { payload, reply }) => {
                            self.add_event(payload, reply).await;
                        }
                        Some(Command::Flush { forced, reply }) => {
                            let result = self.evaluate(forced).await;
                            let _ = reply.send(result);
                        }
                        Some(Command::Status { reply }) => {
                            let _ = reply.send(self.status());
                        }
                        Some(Command::Shutdown { reply }) => {
                            self.drain().await;
                            let _ = reply.send(());
                            break;
                        }
                        None => {
                            // Every handle is gone
                            self.drain().await;
                            break;
                        }
                    }
                }
            }
        }

        debug!(pending = self.pending, "Batch controller stopped");
    }

    async fn add_event(
        &mut self,
        payload: serde_json::Value,
        reply: oneshot::Sender<BatchResult<EventId>>,
    ) {
        let record = EventRecord::new(payload);
        let enqueued_at = record.enqueued_at;

        match self.store.put(record).await {
            Ok(id) => {
                self.pending += 1;
                if self.in_flight.is_some() {
                    self.oldest_since_snapshot.get_or_insert(enqueued_at);
                }
                self.oldest_pending.get_or_insert(enqueued_at);
                debug!(event_id = %id, pending = self.pending, "Event stored");
                let _ = reply.send(Ok(id));
            }
            Err(e) => {
                error!(error = %e, "Failed to store event");
                let _ = reply.send(Err(e.into()));
                return;
            }
        }

        if let Err(e) = self.evaluate(false).await {
            warn!(error = %e, "Flush after enqueue failed");
        }
    }

    fn signals(&self) -> QueueSignals {
        QueueSignals {
            pending_count: self.pending,
            since_last_flush: self.last_flush.elapsed(),
            oldest_pending_age: self
                .oldest_pending
                .map(|t| (Utc::now() - t).to_std().unwrap_or_default()),
        }
    }

    fn status(&self) -> ControllerStatus {
        ControllerStatus {
            signals: self.signals(),
            flushing: self.in_flight.is_some(),
        }
    }

    /// Decide whether to flush and, if so, start the upload
    async fn evaluate(&mut self, forced: bool) -> BatchResult<FlushOutcome> {
        if self.in_flight.is_some() {
            return Ok(FlushOutcome::skipped(SkipReason::InFlight));
        }

        if !forced {
            let signals = self.signals();
            match first_triggered(&self.strategies, &signals) {
                Some(strategy) if signals.pending_count > 0 => {
                    debug!(
                        strategy = strategy.name(),
                        pending = signals.pending_count,
                        "Strategy triggered flush"
                    );
                }
                Some(_) => return Ok(FlushOutcome::skipped(SkipReason::Empty)),
                None => return Ok(FlushOutcome::skipped(SkipReason::NotDue)),
            }
        }

        let batch = self.coordinator.snapshot().await?;
        if batch.is_empty() {
            self.pending = 0;
            self.oldest_pending = None;
            return Ok(FlushOutcome::skipped(SkipReason::Empty));
        }

        // The snapshot is authoritative for what is pending right now
        self.pending = batch.len();
        self.oldest_pending = batch.oldest_enqueued_at();
        self.oldest_since_snapshot = None;
        self.last_flush = Instant::now();
        self.attempts += 1;

        let batch_size = batch.len();
        info!(attempt = self.attempts, batch_size, forced, "Flushing batch");
        self.in_flight = Some(self.coordinator.dispatch(self.attempts, batch));

        Ok(FlushOutcome::Started { batch_size })
    }

    /// Single exit path for an upload: clear the upload state and report
    fn finish_upload(&mut self, joined: Result<UploadResult, JoinError>) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };

        let result = joined.unwrap_or_else(UploadResult::from_join_error);

        match &result.status {
            FlushStatus::Delivered { deleted } => {
                self.pending = self.pending.saturating_sub(*deleted);
                self.oldest_pending = self.oldest_since_snapshot.take();
            }
            FlushStatus::DeliveredNotDeleted { .. } | FlushStatus::Failed { .. } => {
                self.oldest_since_snapshot = None;
            }
        }

        let report = FlushReport {
            attempt: in_flight.attempt,
            batch_size: in_flight.batch_size,
            status: result.status,
            timestamp: Utc::now().timestamp(),
        };

        // No receivers is fine
        let _ = self.reports.send(report);
    }

    /// Wait for an in-flight upload before stopping
    async fn drain(&mut self) {
        if self.in_flight.is_some() {
            info!("Waiting for in-flight batch before shutdown");
            let joined = join_upload(&mut self.in_flight).await;
            self.finish_upload(joined);
        }
    }
}

async fn join_upload(in_flight: &mut Option<InFlight>) -> Result<UploadResult, JoinError> {
    match in_flight {
        Some(in_flight) => (&mut in_flight.handle).await,
        None => pending().await,
    }
}
