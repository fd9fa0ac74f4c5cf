//! Rendering of records into text.

use crate::{Caller, LogRecord};
use std::fmt::Write;
use thiserror::Error;

/// Error returned when a record could not be rendered.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FormatError(String);

impl FormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<std::fmt::Error> for FormatError {
    fn from(error: std::fmt::Error) -> Self {
        Self(error.to_string())
    }
}

/// Renders a record into text.
pub trait Formatter<R>: Send + Sync {
    /// Render a record.
    ///
    /// An empty string means the record has nothing to show.
    ///
    /// # Arguments
    ///
    /// * `record` - Record to render.
    fn format(&self, record: &R) -> Result<String, FormatError>;

    /// Whether rendering needs the caller location of records.
    ///
    /// Defaults to true, since nothing is known about the output.
    fn requires_caller(&self) -> bool {
        true
    }
}

impl<R, F> Formatter<R> for F
where
    F: Fn(&R) -> Result<String, FormatError> + Send + Sync,
{
    fn format(&self, record: &R) -> Result<String, FormatError> {
        self(record)
    }
}

/// Single line formatter for [`LogRecord`]s.
///
/// Renders as `LEVEL target: message key=value ... [k=v ...] (file:line:column)`,
/// with the context and caller sections present only when captured.
#[derive(Debug, Clone, Copy)]
pub struct PatternFormatter {
    caller: bool,
}

impl PatternFormatter {
    /// Create a new formatter.
    ///
    /// # Arguments
    ///
    /// * `caller` - Whether to print the caller location.
    pub fn new(caller: bool) -> Self {
        Self { caller }
    }
}

impl Default for PatternFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Formatter<LogRecord> for PatternFormatter {
    fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        let mut out = String::with_capacity(record.message().len() + 32);
        write!(out, "{} {}: {}", record.level(), record.target(), record.message())?;

        for (key, value) in record.fields() {
            write!(out, " {key}={value}")?;
        }

        if let Some(context) = record.context().filter(|context| !context.is_empty()) {
            out.push_str(" [");
            for (index, (key, value)) in context.iter().enumerate() {
                if index > 0 {
                    out.push(' ');
                }
                write!(out, "{key}={value}")?;
            }
            out.push(']');
        }

        if self.caller {
            match record.caller() {
                Caller::Resolved(info) | Caller::Pending(info) => write!(out, " ({info})")?,
                Caller::Disabled => {}
            }
        }

        Ok(out)
    }

    fn requires_caller(&self) -> bool {
        self.caller
    }
}
