//! Data types for the event outbox
//!
//! This module contains the records stored in the outbox and the
//! values reported back from flush requests.

mod flush;
mod record;

pub use flush::{FlushOutcome, FlushReport, FlushStatus, SkipReason};
pub use record::{Batch, EventId, EventRecord};
