//! Definition of a bounded retention buffer with replay.

use crate::{
    AcceptAll, Consumer, ConsumerError, ConsumerSet, Error, ErrorKind, ErrorManager, Filter,
    Formatter, Record, TracingErrorManager, error::Failures,
};
use parking_lot::ReentrantMutex;
use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// Number of records retained when no limit is configured.
pub const DEFAULT_LIMIT: usize = 10;

/// State guarded by the retention lock.
struct State<R> {
    limit: usize,
    records: VecDeque<Arc<R>>,
}

impl<R> State<R> {
    fn push(&mut self, record: Arc<R>) {
        // A shrunk limit is only enforced here, on the next insert.
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }
}

/// A buffer that retains the last few published records.
///
/// Works pretty much like a ring buffer, few differences:
/// * Every published record is forwarded to the attached consumers.
/// * Consumers can be attached with an atomic replay of retained records,
///   so they see history and every later record with no gap or duplicate.
/// * Retained records can be replayed to all consumers on demand.
///
/// All retention state sits behind a single reentrant lock. Consumers are
/// called while that lock is held, so a slow consumer slows down every
/// producer. A consumer that publishes back into the same buffer from the
/// same thread is ignored rather than recursing.
///
/// Delivery is isolated per consumer. A failing consumer does not stop
/// delivery to the others; the first failure is returned once the pass is done.
pub struct RetentionBuffer<R> {
    state: ReentrantMutex<RefCell<State<R>>>,
    consumers: ConsumerSet<R>,
    enabled: AtomicBool,
    capture_caller: bool,
    filter: Box<dyn Filter<R>>,
    formatter: Option<Box<dyn Formatter<R>>>,
    error_manager: Arc<dyn ErrorManager>,
}

impl<R: Record> RetentionBuffer<R> {
    /// Create a new buffer that retains [`DEFAULT_LIMIT`] records.
    pub fn new() -> Self {
        Self::from_parts(Builder::new())
    }

    /// Create a new buffer.
    ///
    /// Returns [`Error::InvalidLimit`] if limit is 0.
    ///
    /// # Arguments
    ///
    /// * `limit` - Maximum number of records to retain.
    pub fn with_limit(limit: usize) -> Result<Self, Error> {
        Builder::new().limit(limit).build()
    }

    /// Builder to configure a new buffer.
    pub fn builder() -> Builder<R> {
        Builder::new()
    }

    fn from_parts(builder: Builder<R>) -> Self {
        let consumers = ConsumerSet::new();
        for consumer in builder.consumers {
            consumers.attach(consumer);
        }

        Self {
            consumers,
            state: ReentrantMutex::new(RefCell::new(State {
                limit: builder.limit,
                records: VecDeque::with_capacity(builder.limit),
            })),
            enabled: AtomicBool::new(builder.enabled),
            capture_caller: builder.capture_caller,
            filter: builder.filter,
            formatter: builder.formatter,
            error_manager: builder.error_manager,
        }
    }

    /// Publish a record using the configured filter.
    ///
    /// See [`RetentionBuffer::publish_with`].
    ///
    /// # Arguments
    ///
    /// * `record` - Record to publish.
    pub fn publish(&self, record: impl Into<R>) -> Result<(), Error> {
        self.publish_with(record, |record| self.filter.is_loggable(record))
    }

    /// Publish a record.
    ///
    /// * Nothing happens if the buffer is disabled.
    /// * Nothing happens if the current thread is already publishing into this buffer.
    /// * Record is detached and retained only if it is loggable, evicting the oldest
    ///   records when the buffer is full.
    /// * Record is forwarded to every attached consumer, loggable or not.
    ///
    /// # Arguments
    ///
    /// * `record` - Record to publish.
    /// * `is_loggable` - Decides whether the record is retained.
    pub fn publish_with(
        &self,
        record: impl Into<R>,
        is_loggable: impl FnOnce(&R) -> bool,
    ) -> Result<(), Error> {
        if !self.is_enabled() {
            return Ok(());
        }

        // A consumer publishing back into this buffer would recurse forever.
        if self.state.is_owned_by_current_thread() {
            tracing::trace!("Ignoring reentrant publish");
            return Ok(());
        }

        let state = self.state.lock();
        let mut record = record.into();
        let consumers = self.consumers.snapshot();

        if !is_loggable(&record) {
            return deliver(&consumers, &record);
        }

        // Prepare record to outlive the producing thread.
        if self.captures_caller() || consumers.iter().any(|c| c.requires_caller()) {
            record.copy_all();
        } else {
            record.disable_caller_calculation();
            record.copy_context();
        }

        let record = Arc::new(record);
        state.borrow_mut().push(Arc::clone(&record));
        deliver(&consumers, &record)
    }

    /// Maximum number of records retained.
    pub fn limit(&self) -> usize {
        self.state.lock().borrow().limit
    }

    /// Update maximum number of records retained.
    ///
    /// Records beyond a smaller limit are not dropped right away. They are
    /// evicted when the next record is retained.
    ///
    /// Returns [`Error::InvalidLimit`] if limit is 0, leaving the buffer untouched.
    ///
    /// # Arguments
    ///
    /// * `limit` - New maximum number of records to retain.
    pub fn set_limit(&self, limit: usize) -> Result<(), Error> {
        if limit < 1 {
            return Err(Error::InvalidLimit(limit));
        }

        let state = self.state.lock();
        state.borrow_mut().limit = limit;
        tracing::debug!(limit, "Updated retention limit");
        Ok(())
    }

    /// Attach a consumer, optionally replaying retained records to it.
    ///
    /// With replay, the consumer receives every retained record, oldest first,
    /// followed by every record published afterwards. Nothing is missed or
    /// delivered twice around the attach point. The consumer stays attached
    /// even if it fails to accept some of the replayed records.
    ///
    /// # Arguments
    ///
    /// * `consumer` - Consumer to attach.
    /// * `replay` - Whether to replay retained records to the consumer.
    pub fn attach(&self, consumer: Arc<dyn Consumer<R>>, replay: bool) -> Result<(), Error> {
        if !replay {
            self.consumers.attach(consumer);
            return Ok(());
        }

        let state = self.state.lock();
        self.consumers.attach(Arc::clone(&consumer));

        // Consumers may re-enter this buffer, so no borrow is held while delivering.
        let records: Vec<_> = state.borrow().records.iter().cloned().collect();
        tracing::debug!(records = records.len(), "Replaying retained records to new consumer");

        let mut failures = Failures::default();
        for record in &records {
            failures.track(consumer.accept(record));
        }
        failures.into_result()
    }

    /// Detach a consumer.
    ///
    /// Returns true if the consumer was attached.
    ///
    /// # Arguments
    ///
    /// * `consumer` - Consumer to detach, matched by identity.
    pub fn detach(&self, consumer: &Arc<dyn Consumer<R>>) -> bool {
        self.consumers.detach(consumer)
    }

    /// Consumers attached at this exact moment.
    pub fn consumers(&self) -> Vec<Arc<dyn Consumer<R>>> {
        self.consumers.snapshot().to_vec()
    }

    /// Copy of retained records at an exact moment in time, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<R>> {
        self.state.lock().borrow().records.iter().cloned().collect()
    }

    /// Copy of retained records rendered as strings, oldest first.
    ///
    /// Records that fail to render are reported to the error manager and skipped.
    /// Records that render to an empty string are skipped as well.
    ///
    /// # Arguments
    ///
    /// * `formatter` - Formatter used to render records.
    pub fn snapshot_as_strings<F>(&self, formatter: &F) -> Vec<String>
    where
        F: Formatter<R> + ?Sized,
    {
        self.snapshot()
            .iter()
            .filter_map(|record| match formatter.format(record) {
                Ok(formatted) if formatted.is_empty() => None,
                Ok(formatted) => Some(formatted),
                Err(error) => {
                    self.report("Formatting error", Some(&error), ErrorKind::Format);
                    None
                }
            })
            .collect()
    }

    /// Copy of retained records rendered with the configured formatter, oldest first.
    ///
    /// Returns None if the buffer was built without a formatter.
    /// See [`RetentionBuffer::snapshot_as_strings`].
    pub fn snapshot_formatted(&self) -> Option<Vec<String>> {
        let formatter = self.formatter.as_deref()?;
        Some(self.snapshot_as_strings(formatter))
    }

    /// Replay retained records to every attached consumer.
    ///
    /// Records are delivered oldest first, each one to every consumer before
    /// moving on to the next. The retention lock is not held while delivering.
    pub fn replay(&self) -> Result<(), Error> {
        let consumers = self.consumers.snapshot();
        if consumers.is_empty() {
            return Ok(());
        }

        let records = self.snapshot();
        tracing::debug!(
            records = records.len(),
            consumers = consumers.len(),
            "Replaying retained records"
        );

        let mut failures = Failures::default();
        for record in &records {
            for consumer in consumers.iter() {
                failures.track(consumer.accept(record));
            }
        }
        failures.into_result()
    }

    /// Number of records currently retained.
    pub fn len(&self) -> usize {
        self.state.lock().borrow().records.len()
    }

    /// Returns true if no records are retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable this buffer. A disabled buffer ignores published records.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Whether records must capture their caller location before being retained.
    pub fn is_caller_required(&self) -> bool {
        self.captures_caller()
            || self.consumers.snapshot().iter().any(|c| c.requires_caller())
    }

    fn captures_caller(&self) -> bool {
        self.capture_caller || self.formatter.as_ref().is_some_and(|f| f.requires_caller())
    }

    /// Report an error that cannot be returned to the caller.
    pub(crate) fn report(
        &self,
        message: &str,
        cause: Option<&(dyn std::error::Error + 'static)>,
        kind: ErrorKind,
    ) {
        self.error_manager.report(message, cause, kind);
    }
}

impl<R: Record> Default for RetentionBuffer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for RetentionBuffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let (limit, len) = match state.try_borrow() {
            Ok(state) => (Some(state.limit), Some(state.records.len())),
            Err(_) => (None, None),
        };

        f.debug_struct("RetentionBuffer")
            .field("limit", &limit)
            .field("len", &len)
            .field("consumers", &self.consumers)
            .field("enabled", &self.enabled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Buffers nest: a buffer can consume records published to another one.
impl<R: Record + Clone> Consumer<R> for RetentionBuffer<R> {
    fn accept(&self, record: &R) -> Result<(), ConsumerError> {
        self.publish(record.clone())?;
        Ok(())
    }

    fn requires_caller(&self) -> bool {
        self.is_caller_required()
    }
}

/// Deliver a record to every consumer, in order.
fn deliver<R>(consumers: &[Arc<dyn Consumer<R>>], record: &R) -> Result<(), Error> {
    let mut failures = Failures::default();
    for consumer in consumers {
        failures.track(consumer.accept(record));
    }
    failures.into_result()
}

/// Builder for a [`RetentionBuffer`].
pub struct Builder<R> {
    limit: usize,
    enabled: bool,
    capture_caller: bool,
    filter: Box<dyn Filter<R>>,
    formatter: Option<Box<dyn Formatter<R>>>,
    error_manager: Arc<dyn ErrorManager>,
    consumers: Vec<Arc<dyn Consumer<R>>>,
}

impl<R: Record> Builder<R> {
    fn new() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            enabled: true,
            capture_caller: false,
            filter: Box::new(AcceptAll),
            formatter: None,
            error_manager: Arc::new(TracingErrorManager),
            consumers: Vec::new(),
        }
    }

    /// Maximum number of records to retain, must be >= 1.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether the buffer starts enabled. Defaults to true.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Always capture caller locations of retained records, even if no
    /// consumer asks for them. Defaults to false.
    pub fn capture_caller(mut self, capture_caller: bool) -> Self {
        self.capture_caller = capture_caller;
        self
    }

    /// Filter that decides which records are retained. Defaults to [`AcceptAll`].
    pub fn filter(mut self, filter: impl Filter<R> + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Formatter used by [`RetentionBuffer::snapshot_formatted`].
    ///
    /// Records capture their caller location when the formatter requires it.
    pub fn formatter(mut self, formatter: impl Formatter<R> + 'static) -> Self {
        self.formatter = Some(Box::new(formatter));
        self
    }

    /// Destination for errors recovered locally. Defaults to [`TracingErrorManager`].
    pub fn error_manager(mut self, error_manager: impl ErrorManager + 'static) -> Self {
        self.error_manager = Arc::new(error_manager);
        self
    }

    /// Consumer attached when the buffer is built.
    pub fn consumer(mut self, consumer: Arc<dyn Consumer<R>>) -> Self {
        self.consumers.push(consumer);
        self
    }

    /// Build the buffer.
    ///
    /// Returns [`Error::InvalidLimit`] if the configured limit is 0.
    pub fn build(self) -> Result<RetentionBuffer<R>, Error> {
        if self.limit < 1 {
            return Err(Error::InvalidLimit(self.limit));
        }
        Ok(RetentionBuffer::from_parts(self))
    }
}

impl<R> fmt::Debug for Builder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("limit", &self.limit)
            .field("enabled", &self.enabled)
            .field("capture_caller", &self.capture_caller)
            .field("formatter", &self.formatter.is_some())
            .field("consumers", &self.consumers.len())
            .finish_non_exhaustive()
    }
}
