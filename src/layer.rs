//! Bridge from `tracing` events into a retention buffer.

use crate::{Caller, CallerInfo, ErrorKind, LogRecord, RetentionBuffer};
use std::{collections::BTreeMap, fmt, sync::Arc};
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context};

/// A [`Layer`] that publishes every `tracing` event into a [`RetentionBuffer`].
///
/// The `message` field becomes the record message, all other fields become
/// structured record fields.
#[derive(Debug, Clone)]
pub struct RetentionLayer {
    buffer: Arc<RetentionBuffer<LogRecord>>,
}

impl RetentionLayer {
    /// Create a new layer.
    ///
    /// # Arguments
    ///
    /// * `buffer` - Buffer to publish events into.
    pub fn new(buffer: Arc<RetentionBuffer<LogRecord>>) -> Self {
        Self { buffer }
    }

    /// Buffer this layer publishes into.
    pub fn buffer(&self) -> &Arc<RetentionBuffer<LogRecord>> {
        &self.buffer
    }
}

impl<S: Subscriber> Layer<S> for RetentionLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let caller = match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => Caller::Pending(CallerInfo {
                file,
                line,
                column: 0,
            }),
            _ => Caller::Disabled,
        };

        let mut record = LogRecord::new(
            *metadata.level(),
            metadata.target(),
            visitor.message.unwrap_or_default(),
        )
        .with_caller(caller);

        for (key, value) in visitor.fields {
            record = record.with_field(key, value);
        }

        // Events emitted from inside a subscriber go nowhere.
        if let Err(error) = self.buffer.publish(record) {
            self.buffer.report("Delivery error", Some(&error), ErrorKind::Write);
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, String>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}
