//! Definition of downstream consumers and the set that holds them.

use crate::ConsumerError;
use parking_lot::RwLock;
use std::{fmt, sync::Arc};

/// Downstream destination for published records.
pub trait Consumer<R>: Send + Sync {
    /// Accept a record.
    ///
    /// # Arguments
    ///
    /// * `record` - Record to accept.
    fn accept(&self, record: &R) -> Result<(), ConsumerError>;

    /// Whether this consumer needs the caller location of records.
    fn requires_caller(&self) -> bool {
        false
    }
}

/// A [`Consumer`] backed by a closure.
pub struct FnConsumer<F> {
    f: F,
    caller: bool,
}

impl<F> FnConsumer<F> {
    /// Create a new consumer that does not need caller locations.
    ///
    /// # Arguments
    ///
    /// * `f` - Closure invoked with every record.
    pub fn new(f: F) -> Self {
        Self { f, caller: false }
    }

    /// Mark this consumer as needing caller locations.
    pub fn with_caller(mut self) -> Self {
        self.caller = true;
        self
    }
}

impl<F> fmt::Debug for FnConsumer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConsumer")
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

impl<R, F> Consumer<R> for FnConsumer<F>
where
    F: Fn(&R) -> Result<(), ConsumerError> + Send + Sync,
{
    fn accept(&self, record: &R) -> Result<(), ConsumerError> {
        (self.f)(record)
    }

    fn requires_caller(&self) -> bool {
        self.caller
    }
}

/// Ordered set of consumers.
///
/// Mutations replace the whole list, so readers get a consistent snapshot
/// without holding any lock while they deliver records.
pub struct ConsumerSet<R> {
    consumers: RwLock<Arc<[Arc<dyn Consumer<R>>]>>,
}

impl<R> ConsumerSet<R> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            consumers: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Add a consumer to the end of the set.
    ///
    /// # Arguments
    ///
    /// * `consumer` - Consumer to add.
    pub fn attach(&self, consumer: Arc<dyn Consumer<R>>) {
        let mut consumers = self.consumers.write();
        let mut next = Vec::with_capacity(consumers.len() + 1);
        next.extend(consumers.iter().cloned());
        next.push(consumer);
        *consumers = next.into();
    }

    /// Remove a consumer from the set.
    ///
    /// Consumers are matched by identity. Returns true if the consumer was found.
    ///
    /// # Arguments
    ///
    /// * `consumer` - Consumer to remove.
    pub fn detach(&self, consumer: &Arc<dyn Consumer<R>>) -> bool {
        let mut consumers = self.consumers.write();
        let Some(index) = consumers.iter().position(|c| same(c, consumer)) else {
            return false;
        };

        let mut next = consumers.to_vec();
        next.remove(index);
        *consumers = next.into();
        true
    }

    /// Consumers in the set at this exact moment.
    pub fn snapshot(&self) -> Arc<[Arc<dyn Consumer<R>>]> {
        Arc::clone(&self.consumers.read())
    }

    /// Number of consumers in the set.
    pub fn len(&self) -> usize {
        self.consumers.read().len()
    }

    /// Returns true if there are no consumers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> Default for ConsumerSet<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for ConsumerSet<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerSet")
            .field("len", &self.len())
            .finish()
    }
}

// Compare data pointers only, vtables are not guaranteed unique.
fn same<R>(a: &Arc<dyn Consumer<R>>, b: &Arc<dyn Consumer<R>>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn collector() -> (Arc<Mutex<Vec<u32>>>, Arc<dyn Consumer<u32>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let consumer = FnConsumer::new(move |record: &u32| -> Result<(), ConsumerError> {
            sink.lock().push(*record);
            Ok(())
        });
        (seen, Arc::new(consumer))
    }

    #[test]
    fn attach_preserves_order() -> Result<(), ConsumerError> {
        let set = ConsumerSet::new();
        let (first, a) = collector();
        let (second, b) = collector();
        set.attach(a);
        set.attach(b);
        assert_eq!(set.len(), 2);

        for (index, consumer) in set.snapshot().iter().enumerate() {
            consumer.accept(&(index as u32))?;
        }
        assert_eq!(*first.lock(), [0]);
        assert_eq!(*second.lock(), [1]);
        Ok(())
    }

    #[test]
    fn detach_by_identity() {
        let set = ConsumerSet::new();
        let (_, a) = collector();
        let (_, b) = collector();
        set.attach(Arc::clone(&a));
        set.attach(Arc::clone(&b));

        assert!(set.detach(&a));
        assert!(!set.detach(&a));
        assert_eq!(set.len(), 1);
        assert!(same(&set.snapshot()[0], &b));

        assert!(set.detach(&b));
        assert!(set.is_empty());
    }

    #[test]
    fn snapshot_is_stable() {
        let set = ConsumerSet::new();
        let (_, a) = collector();
        set.attach(Arc::clone(&a));

        let snapshot = set.snapshot();
        set.detach(&a);
        assert_eq!(snapshot.len(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn caller_requirement() {
        let plain = FnConsumer::new(|_: &u32| -> Result<(), ConsumerError> { Ok(()) });
        let caller =
            FnConsumer::new(|_: &u32| -> Result<(), ConsumerError> { Ok(()) }).with_caller();
        assert!(!Consumer::<u32>::requires_caller(&plain));
        assert!(Consumer::<u32>::requires_caller(&caller));
    }
}
