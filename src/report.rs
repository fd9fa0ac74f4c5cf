//! Side channel for errors that must not fail the caller.

use std::{error::Error as StdError, fmt};

/// Category of a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A record could not be delivered downstream.
    Write,
    /// A record could not be rendered.
    Format,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Write => "write",
            ErrorKind::Format => "format",
        };
        f.write_str(name)
    }
}

/// Receives errors that a buffer recovers from locally.
pub trait ErrorManager: Send + Sync {
    /// Report an error.
    ///
    /// # Arguments
    ///
    /// * `message` - Description of what failed.
    /// * `cause` - Underlying error, if any.
    /// * `kind` - Category of the failure.
    fn report(&self, message: &str, cause: Option<&(dyn StdError + 'static)>, kind: ErrorKind);
}

/// Reports errors as `tracing` events at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorManager;

impl ErrorManager for TracingErrorManager {
    fn report(&self, message: &str, cause: Option<&(dyn StdError + 'static)>, kind: ErrorKind) {
        match cause {
            Some(cause) => tracing::error!(%kind, error = cause, "{message}"),
            None => tracing::error!(%kind, "{message}"),
        }
    }
}

impl<F> ErrorManager for F
where
    F: Fn(&str, Option<&(dyn StdError + 'static)>, ErrorKind) + Send + Sync,
{
    fn report(&self, message: &str, cause: Option<&(dyn StdError + 'static)>, kind: ErrorKind) {
        self(message, cause, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Write, "write")]
    #[case(ErrorKind::Format, "format")]
    fn kind_display(#[case] kind: ErrorKind, #[case] expected: &str) {
        assert_eq!(kind.to_string(), expected);
    }

    #[test]
    fn closure_manager() {
        let reports = Mutex::new(Vec::new());
        let manager = |message: &str, cause: Option<&(dyn StdError + 'static)>, kind: ErrorKind| {
            reports
                .lock()
                .push((message.to_owned(), cause.map(ToString::to_string), kind));
        };

        let cause = std::fmt::Error;
        manager.report("Formatting error", Some(&cause), ErrorKind::Format);
        manager.report("Delivery error", None, ErrorKind::Write);

        let reports = reports.into_inner();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].0, "Formatting error");
        assert!(reports[0].1.is_some());
        assert_eq!(reports[0].2, ErrorKind::Format);
        assert_eq!(reports[1].1, None);
    }

    #[test]
    fn tracing_manager_does_not_panic() {
        let cause = std::fmt::Error;
        TracingErrorManager.report("Formatting error", Some(&cause), ErrorKind::Format);
        TracingErrorManager.report("Delivery error", None, ErrorKind::Write);
    }
}
