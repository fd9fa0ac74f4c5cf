//! Definition of errors returned by retention buffers.

use thiserror::Error;

/// Error returned by a [`Consumer`](crate::Consumer) that failed to accept a record.
pub type ConsumerError = Box<dyn std::error::Error + Send + Sync>;

/// Different types of error that can happen when interacting with a
/// [`RetentionBuffer`](crate::RetentionBuffer).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Queue length must be at least 1, got: {0}")]
    InvalidLimit(usize),

    #[error("Delivery failed {failed} time(s), first failure: {source}")]
    Delivery {
        failed: usize,
        #[source]
        source: ConsumerError,
    },
}

/// Accumulates consumer failures across a delivery pass.
///
/// Delivery is isolated per consumer, so a pass keeps going after a failure.
/// Only the first cause is kept, the rest are counted.
#[derive(Debug, Default)]
pub(crate) struct Failures {
    failed: usize,
    first: Option<ConsumerError>,
}

impl Failures {
    /// Record the outcome of a single delivery attempt.
    ///
    /// # Arguments
    ///
    /// * `result` - Result returned by the consumer.
    pub(crate) fn track(&mut self, result: Result<(), ConsumerError>) {
        if let Err(error) = result {
            tracing::warn!(error = %error, "Consumer failed to accept record");
            self.failed += 1;
            if self.first.is_none() {
                self.first = Some(error);
            }
        }
    }

    /// Convert accumulated failures into a result.
    pub(crate) fn into_result(self) -> Result<(), Error> {
        match self.first {
            None => Ok(()),
            Some(source) => Err(Error::Delivery {
                failed: self.failed,
                source,
            }),
        }
    }
}
