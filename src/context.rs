//! Thread bound diagnostic context.
//!
//! Every thread carries its own map of key/value pairs that log records can
//! capture when they are detached from the producing thread. Entries stay
//! until removed, cleared or the thread exits.

use std::{cell::RefCell, collections::BTreeMap};

/// Key/value pairs captured from the diagnostic context.
pub type ContextMap = BTreeMap<String, String>;

thread_local! {
    static CONTEXT: RefCell<ContextMap> = const { RefCell::new(BTreeMap::new()) };
}

/// Insert a value into the diagnostic context of the current thread.
///
/// Returns the previous value for the key, if any.
///
/// # Arguments
///
/// * `key` - Key of the entry.
/// * `value` - Value of the entry.
pub fn put(key: impl Into<String>, value: impl Into<String>) -> Option<String> {
    CONTEXT.with_borrow_mut(|context| context.insert(key.into(), value.into()))
}

/// Get a value from the diagnostic context of the current thread.
///
/// # Arguments
///
/// * `key` - Key of the entry.
pub fn get(key: &str) -> Option<String> {
    CONTEXT.with_borrow(|context| context.get(key).cloned())
}

/// Remove a value from the diagnostic context of the current thread.
///
/// # Arguments
///
/// * `key` - Key of the entry.
pub fn remove(key: &str) -> Option<String> {
    CONTEXT.with_borrow_mut(|context| context.remove(key))
}

/// Remove every entry from the diagnostic context of the current thread.
pub fn clear() {
    CONTEXT.with_borrow_mut(BTreeMap::clear);
}

/// Copy of the diagnostic context of the current thread.
pub fn snapshot() -> ContextMap {
    CONTEXT.with_borrow(Clone::clone)
}

/// Insert a value that is removed again when the returned guard is dropped.
///
/// The previous value, if any, is restored on drop.
///
/// # Arguments
///
/// * `key` - Key of the entry.
/// * `value` - Value of the entry.
#[must_use = "Entry is removed as soon as the guard is dropped"]
pub fn scoped(key: impl Into<String>, value: impl Into<String>) -> Guard {
    let key = key.into();
    let previous = put(key.clone(), value);
    Guard { key, previous }
}

/// Restores a diagnostic context entry on drop.
#[derive(Debug)]
pub struct Guard {
    key: String,
    previous: Option<String>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(previous) => {
                put(self.key.clone(), previous);
            }
            None => {
                remove(&self.key);
            }
        }
    }
}
