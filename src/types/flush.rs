//! Flush outcome and report types
//!
//! `FlushOutcome` answers a flush request immediately; `FlushReport` is
//! broadcast later, once the collaborator's result is known.

use serde::{Deserialize, Serialize};

/// Why a flush request did not start a delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Nothing pending; the collaborator is never called with an empty batch
    Empty,
    /// No strategy asked for a flush and the request was not forced
    NotDue,
    /// A delivery attempt is already in flight; the request was coalesced
    InFlight,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Empty => write!(f, "empty"),
            SkipReason::NotDue => write!(f, "not_due"),
            SkipReason::InFlight => write!(f, "in_flight"),
        }
    }
}

/// Immediate answer to a flush request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlushOutcome {
    /// A snapshot was taken and handed to the collaborator
    Started { batch_size: usize },
    /// No delivery attempt was made
    Skipped { reason: SkipReason },
}

impl FlushOutcome {
    pub fn skipped(reason: SkipReason) -> Self {
        FlushOutcome::Skipped { reason }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, FlushOutcome::Started { .. })
    }
}

/// Final state of one delivery attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlushStatus {
    /// Collaborator acknowledged the batch and its records were deleted
    Delivered { deleted: usize },
    /// Collaborator acknowledged the batch but the store delete failed;
    /// the records stay pending and will be sent again
    DeliveredNotDeleted { error: String },
    /// Collaborator reported failure; nothing was deleted
    Failed { error: String },
}

/// Report broadcast after every delivery attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlushReport {
    /// Monotonically increasing attempt number for this controller
    pub attempt: u64,

    /// Number of records in the snapshot
    pub batch_size: usize,

    /// How the attempt ended
    #[serde(flatten)]
    pub status: FlushStatus,

    /// Unix timestamp when the attempt finished
    pub timestamp: i64,
}

impl FlushReport {
    /// True when the batch's records are no longer pending
    pub fn is_delivered(&self) -> bool {
        matches!(self.status, FlushStatus::Delivered { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&FlushOutcome::Started { batch_size: 4 }).unwrap();
        assert_eq!(json, r#"{"type":"started","batch_size":4}"#);

        let skipped = FlushOutcome::skipped(SkipReason::InFlight);
        assert!(!skipped.is_started());
        assert!(FlushOutcome::Started { batch_size: 1 }.is_started());

        let json = serde_json::to_string(&skipped).unwrap();
        assert_eq!(json, r#"{"type":"skipped","reason":"in_flight"}"#);
    }

    #[test]
    fn test_report_flattens_status() {
        let report = FlushReport {
            attempt: 3,
            batch_size: 2,
            status: FlushStatus::Failed {
                error: "status 503".to_string(),
            },
            timestamp: 1704067200,
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"error\":\"status 503\""));
        assert!(!report.is_delivered());
    }
}
