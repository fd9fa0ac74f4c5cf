//! # Backlog
//!
//! Backlog keeps the last few log records in memory and replays them to consumers that
//! attach late. A consumer attached with replay receives the retained history followed
//! by every record published afterwards, with no gap and no duplicate in between.
//!
//! ## Record
//!
//! A [`Record`] is a log event that can outlive the thread that produced it. Before a
//! record is retained it is detached, capturing the caller location and the thread
//! bound [`context`] if anyone needs them. [`LogRecord`] is a ready to use structured
//! record.
//!
//! ## Retention
//!
//! A [`RetentionBuffer`] holds up to `limit` records, evicting the oldest one first.
//! Records are retained only if they pass the configured [`Filter`], but every published
//! record is forwarded to the attached [`Consumer`]s.
//!
//! ### Features
//!
//! * `layer` - Enabled by default. Provides [`RetentionLayer`], a
//!   [`tracing_subscriber`](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/)
//!   layer that publishes `tracing` events into a buffer.

pub mod context;

pub(crate) mod consumer;
pub(crate) mod error;
pub(crate) mod filter;
pub(crate) mod format;
pub(crate) mod record;
pub(crate) mod report;
pub(crate) mod retention;

#[cfg(feature = "layer")]
pub(crate) mod layer;

// Externally exposed types.
pub use consumer::{Consumer, ConsumerSet, FnConsumer};
pub use error::{ConsumerError, Error};
pub use filter::{AcceptAll, Filter, LevelThreshold};
pub use format::{FormatError, Formatter, PatternFormatter};
pub use record::{Caller, CallerInfo, LogRecord, Record};
pub use report::{ErrorKind, ErrorManager, TracingErrorManager};
pub use retention::{Builder, DEFAULT_LIMIT, RetentionBuffer};

#[cfg(feature = "layer")]
pub use layer::RetentionLayer;
