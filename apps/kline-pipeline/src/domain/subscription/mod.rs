//! Subscriber Registry
//!
//! A concurrent-safe set of subscriber handles keyed by [`SubscriberId`].
//!
//! # Design
//!
//! The set is shared between the fan-out task (which iterates it) and the
//! per-connection handlers (which insert on connect and remove on close).
//! One mutex guards insert, snapshot, and remove. The container itself is
//! never handed out: callers get a cloned snapshot of the handles, so the lock
//! is never held while a handle is doing I/O.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use uuid::Uuid;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a connected subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Subscriber Set
// =============================================================================

/// Mutex-guarded set of subscriber handles.
///
/// # Example
///
/// ```rust
/// use kline_pipeline::domain::subscription::SubscriberSet;
///
/// let set = SubscriberSet::new();
/// let id = set.register("conn-a");
/// assert_eq!(set.len(), 1);
///
/// assert_eq!(set.unregister(id), Some("conn-a"));
/// assert!(set.is_empty());
/// ```
pub struct SubscriberSet<H> {
    handles: Mutex<HashMap<SubscriberId, H>>,
}

impl<H> SubscriberSet<H> {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a handle and return its newly assigned id.
    pub fn register(&self, handle: H) -> SubscriberId {
        let id = SubscriberId::new();
        self.handles.lock().insert(id, handle);
        id
    }

    /// Remove a handle, returning it if it was still registered.
    pub fn unregister(&self, id: SubscriberId) -> Option<H> {
        self.handles.lock().remove(&id)
    }

    /// Remove every id in `ids`, returning the handles that were still present.
    pub fn unregister_all(&self, ids: &[SubscriberId]) -> Vec<(SubscriberId, H)> {
        let mut handles = self.handles.lock();
        ids.iter()
            .filter_map(|id| handles.remove(id).map(|h| (*id, h)))
            .collect()
    }

    /// Whether `id` is currently registered.
    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.handles.lock().contains_key(&id)
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Whether no subscribers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

impl<H: Clone> SubscriberSet<H> {
    /// Clone out the current handles for iteration outside the lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(SubscriberId, H)> {
        self.handles
            .lock()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }
}

impl<H> Default for SubscriberSet<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for SubscriberSet<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
