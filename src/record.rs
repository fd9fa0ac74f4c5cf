//! Definition of records that can be retained by a buffer.

use crate::context::{self, ContextMap};
use std::{collections::BTreeMap, fmt, panic::Location, time::SystemTime};
use tracing::Level;

/// A log event that can be retained past the call stack that produced it.
///
/// Records often carry state that is only valid on the producing thread,
/// such as a lazily computed caller location or the diagnostic context.
/// Before a record is retained or handed to another thread, the buffer calls
/// one of the detach operations below. All of them must be idempotent.
///
/// Default implementations are no-ops, which is correct for records that are
/// already self-contained.
pub trait Record: Send + Sync + 'static {
    /// Capture everything bound to the producing thread, caller location included.
    fn copy_all(&mut self) {}

    /// Stop any pending caller location computation.
    fn disable_caller_calculation(&mut self) {}

    /// Capture the diagnostic context of the producing thread.
    fn copy_context(&mut self) {}
}

/// Source location where a record was produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerInfo {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl From<&'static Location<'static>> for CallerInfo {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for CallerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Caller location state of a [`LogRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Location is known but not yet captured by the record.
    Pending(CallerInfo),

    /// Location has been resolved and is owned by the record.
    Resolved(CallerInfo),

    /// Nobody needs the location, so it will never be resolved.
    Disabled,
}

/// A structured log event.
#[derive(Debug, Clone)]
pub struct LogRecord {
    level: Level,
    target: String,
    message: String,
    fields: BTreeMap<String, String>,
    timestamp: SystemTime,
    caller: Caller,
    thread: Option<String>,
    context: Option<ContextMap>,
}

impl LogRecord {
    /// Create a new record.
    ///
    /// Caller location is left pending until the record is detached.
    ///
    /// # Arguments
    ///
    /// * `level` - Severity of the record.
    /// * `target` - Name of the component that produced the record.
    /// * `message` - Human readable message.
    #[track_caller]
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_location(level, target, message, Location::caller())
    }

    /// Create a new record with an explicit caller location.
    ///
    /// # Arguments
    ///
    /// * `level` - Severity of the record.
    /// * `target` - Name of the component that produced the record.
    /// * `message` - Human readable message.
    /// * `location` - Source location that produced the record.
    pub fn with_location(
        level: Level,
        target: impl Into<String>,
        message: impl Into<String>,
        location: &'static Location<'static>,
    ) -> Self {
        Self {
            level,
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            timestamp: SystemTime::now(),
            caller: Caller::Pending(location.into()),
            thread: None,
            context: None,
        }
    }

    /// Attach a structured field to this record.
    ///
    /// # Arguments
    ///
    /// * `key` - Name of the field.
    /// * `value` - Value of the field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Replace the caller location of this record.
    ///
    /// # Arguments
    ///
    /// * `caller` - New caller location state.
    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = caller;
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Name of the producing thread, once captured.
    pub fn thread(&self) -> Option<&str> {
        self.thread.as_deref()
    }

    /// Diagnostic context of the producing thread, once captured.
    pub fn context(&self) -> Option<&ContextMap> {
        self.context.as_ref()
    }

    /// Resolved caller location, if any.
    pub fn caller_info(&self) -> Option<&CallerInfo> {
        match &self.caller {
            Caller::Resolved(info) => Some(info),
            Caller::Pending(_) | Caller::Disabled => None,
        }
    }
}

impl Record for LogRecord {
    fn copy_all(&mut self) {
        if let Caller::Pending(info) = &self.caller {
            self.caller = Caller::Resolved(info.clone());
        }

        if self.thread.is_none() {
            let current = std::thread::current();
            self.thread = Some(
                current
                    .name()
                    .map_or_else(|| format!("{:?}", current.id()), str::to_owned),
            );
        }

        self.copy_context();
    }

    fn disable_caller_calculation(&mut self) {
        if let Caller::Pending(_) = self.caller {
            self.caller = Caller::Disabled;
        }
    }

    fn copy_context(&mut self) {
        if self.context.is_none() {
            self.context = Some(context::snapshot());
        }
    }
}

impl Record for String {}

impl Record for &'static str {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_is_pending_until_detached() {
        let record = LogRecord::new(Level::INFO, "test", "hello");
        assert!(matches!(record.caller(), Caller::Pending(_)));
        assert_eq!(record.caller_info(), None);
        assert_eq!(record.thread(), None);
        assert_eq!(record.context(), None);
    }

    #[test]
    fn copy_all_resolves_everything() {
        context::clear();
        context::put("request", "42");

        let line = line!() + 1;
        let mut record = LogRecord::new(Level::WARN, "test", "hello");
        record.copy_all();
        context::clear();

        let info = record.caller_info().expect("Caller should be resolved");
        assert_eq!(info.file, file!());
        assert_eq!(info.line, line);
        assert!(record.thread().is_some());

        let context = record.context().expect("Context should be captured");
        assert_eq!(context.get("request").map(String::as_str), Some("42"));
    }

    #[test]
    fn disable_caller_keeps_context() {
        context::clear();
        context::put("user", "alice");

        let mut record = LogRecord::new(Level::DEBUG, "test", "hello");
        record.disable_caller_calculation();
        record.copy_context();
        context::clear();

        assert_eq!(record.caller(), &Caller::Disabled);
        assert_eq!(record.thread(), None);
        assert_eq!(
            record.context().and_then(|context| context.get("user")).map(String::as_str),
            Some("alice")
        );
    }

    #[test]
    fn detach_is_idempotent() {
        context::clear();
        context::put("phase", "first");

        let mut record = LogRecord::new(Level::INFO, "test", "hello");
        record.copy_all();
        let resolved = record.caller().clone();

        // Second detach on another context must not overwrite captured state.
        context::put("phase", "second");
        record.copy_all();
        record.disable_caller_calculation();
        context::clear();

        assert_eq!(record.caller(), &resolved);
        assert_eq!(
            record.context().and_then(|context| context.get("phase")).map(String::as_str),
            Some("first")
        );
    }

    #[test]
    fn fields_are_ordered() {
        let record = LogRecord::new(Level::INFO, "test", "hello")
            .with_field("b", "2")
            .with_field("a", "1");
        let keys: Vec<_> = record.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "b"]);
    }
}
