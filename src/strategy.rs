//! Batching strategies
//!
//! Strategies are pure decision functions over observable queue state.
//! The controller flushes when any configured strategy says so.

use std::time::Duration;

/// Observable queue state handed to strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueSignals {
    /// Records currently pending in the store
    pub pending_count: usize,
    /// Time since the last flush attempt started
    pub since_last_flush: Duration,
    /// Age of the oldest pending record, if any
    pub oldest_pending_age: Option<Duration>,
}

/// A pluggable flush policy
pub trait FlushStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Decide whether the queue should be flushed now
    fn should_flush_signals(&self, signals: &QueueSignals) -> bool;
}

/// Flush once enough records are pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeStrategy {
    threshold: usize,
}

impl SizeStrategy {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// True once `pending_count >= threshold`
    pub fn should_flush(&self, pending_count: usize) -> bool {
        pending_count >= self.threshold
    }
}

impl FlushStrategy for SizeStrategy {
    fn name(&self) -> &'static str {
        "size"
    }

    fn should_flush_signals(&self, signals: &QueueSignals) -> bool {
        self.should_flush(signals.pending_count)
    }
}

/// Flush once enough time has passed since the last flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStrategy {
    interval: Duration,
}

impl TimeStrategy {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True once `elapsed` strictly exceeds the interval
    pub fn should_flush(&self, elapsed_since_last_flush: Duration) -> bool {
        elapsed_since_last_flush > self.interval
    }
}

impl FlushStrategy for TimeStrategy {
    fn name(&self) -> &'static str {
        "time"
    }

    fn should_flush_signals(&self, signals: &QueueSignals) -> bool {
        self.should_flush(signals.since_last_flush)
    }
}

/// Name of the first strategy that fires, if any
pub fn first_triggered<'a>(
    strategies: &'a [Box<dyn FlushStrategy>],
    signals: &QueueSignals,
) -> Option<&'a dyn FlushStrategy> {
    strategies
        .iter()
        .map(|s| s.as_ref())
        .find(|s| s.should_flush_signals(signals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_strategy_threshold() {
        let strategy = SizeStrategy::new(5);
        assert_eq!(strategy.threshold(), 5);
        assert!(!strategy.should_flush(0));
        assert!(!strategy.should_flush(4));
        assert!(strategy.should_flush(5));
        assert!(strategy.should_flush(6));
    }

    #[test]
    fn test_time_strategy_requires_exceeding_interval() {
        let strategy = TimeStrategy::new(Duration::from_secs(10));
        assert_eq!(strategy.interval(), Duration::from_secs(10));
        assert!(!strategy.should_flush(Duration::from_secs(9)));
        assert!(!strategy.should_flush(Duration::from_secs(10)));
        assert!(strategy.should_flush(Duration::from_millis(10_001)));
    }

    #[test]
    fn test_strategies_read_their_own_signal() {
        let signals = QueueSignals {
            pending_count: 100,
            since_last_flush: Duration::ZERO,
            oldest_pending_age: Some(Duration::from_secs(3600)),
        };

        assert!(SizeStrategy::new(10).should_flush_signals(&signals));
        assert!(!TimeStrategy::new(Duration::from_secs(1)).should_flush_signals(&signals));
    }

    #[test]
    fn test_first_triggered_is_either() {
        let strategies: Vec<Box<dyn FlushStrategy>> = vec![
            Box::new(SizeStrategy::new(5)),
            Box::new(TimeStrategy::new(Duration::from_secs(30))),
        ];

        let idle = QueueSignals {
            pending_count: 2,
            since_last_flush: Duration::from_secs(1),
            oldest_pending_age: None,
        };
        assert!(first_triggered(&strategies, &idle).is_none());

        let stale = QueueSignals {
            since_last_flush: Duration::from_secs(31),
            ..idle
        };
        assert_eq!(first_triggered(&strategies, &stale).map(|s| s.name()), Some("time"));

        let full = QueueSignals {
            pending_count: 5,
            ..idle
        };
        assert_eq!(first_triggered(&strategies, &full).map(|s| s.name()), Some("size"));
    }
}
