//! Predicates that decide whether a record is retained.

use crate::LogRecord;
use tracing::Level;

/// Decides whether a record qualifies for retention.
pub trait Filter<R>: Send + Sync {
    /// Returns true if the record should be retained.
    ///
    /// # Arguments
    ///
    /// * `record` - Record to test.
    fn is_loggable(&self, record: &R) -> bool;
}

impl<R, F> Filter<R> for F
where
    F: Fn(&R) -> bool + Send + Sync,
{
    fn is_loggable(&self, record: &R) -> bool {
        self(record)
    }
}

/// Accepts every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl<R> Filter<R> for AcceptAll {
    fn is_loggable(&self, _record: &R) -> bool {
        true
    }
}

/// Accepts [`LogRecord`]s at or above a severity threshold.
///
/// Severity follows `tracing` ordering, where `ERROR` is the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelThreshold(Level);

impl LevelThreshold {
    /// Create a new filter.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Least severe level that is still accepted.
    pub fn new(threshold: Level) -> Self {
        Self(threshold)
    }

    pub fn threshold(&self) -> Level {
        self.0
    }
}

impl Filter<LogRecord> for LevelThreshold {
    fn is_loggable(&self, record: &LogRecord) -> bool {
        // In tracing, more verbose levels compare greater.
        record.level() <= self.0
    }
}
