//! Dynamic<T> - an observable value cell
//!
//! Every piece of state the synchronizers expose to view code (a review
//! record, a note list, a loading flag, the active role) lives in a
//! `Dynamic<T>`. Writes bump a version counter; subscribers either poll for
//! the latest value or await the next change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Notify;

struct DynamicInner<T> {
    value: RwLock<T>,
    version: AtomicU64,
    notify: Notify,
}

/// A reactive value that can be observed for changes.
///
/// Clones share the same cell. Subscriptions are version-based, so rapid
/// successive writes coalesce into a single observed change.
///
/// # Example
///
/// ```rust
/// use casework_core::reactive::Dynamic;
///
/// let counter = Dynamic::new(0);
/// let mut sub = counter.subscribe();
///
/// counter.set(1);
/// assert_eq!(counter.get(), 1);
/// assert_eq!(sub.poll(), Some(1));
/// assert_eq!(sub.poll(), None);
/// ```
pub struct Dynamic<T> {
    inner: Arc<DynamicInner<T>>,
}

impl<T> Clone for Dynamic<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Dynamic<T> {
    /// Create a new Dynamic with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(DynamicInner {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Clone out the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Read the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Number of writes since creation.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Store a new value and wake subscribers.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        self.bump();
    }

    /// Store a new value, returning the one it replaced.
    pub fn replace(&self, value: T) -> T {
        let previous = std::mem::replace(&mut *self.inner.value.write(), value);
        self.bump();
        previous
    }

    /// Apply `f` to the current value and store the result.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(T) -> T,
    {
        let mut guard = self.inner.value.write();
        let next = f(guard.clone());
        *guard = next;
        drop(guard);
        self.bump();
    }

    /// Subscribe to value changes from the current version onward.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            source: Arc::clone(&self.inner),
            last_version: self.inner.version.load(Ordering::Acquire),
        }
    }

    fn bump(&self) {
        self.inner.version.fetch_add(1, Ordering::Release);
        self.inner.notify.notify_waiters();
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Dynamic<T> {
    /// Store `value` only if it differs from the current one.
    ///
    /// Returns `true` when a write (and version bump) happened.
    pub fn set_if_changed(&self, value: T) -> bool {
        let mut guard = self.inner.value.write();
        if *guard == value {
            return false;
        }
        *guard = value;
        drop(guard);
        self.bump();
        true
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for Dynamic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dynamic")
            .field("value", &self.get())
            .field("version", &self.version())
            .finish()
    }
}

/// A subscription to a Dynamic value.
pub struct Subscription<T> {
    source: Arc<DynamicInner<T>>,
    last_version: u64,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    /// Check if the source has changed since the last poll.
    pub fn has_changed(&self) -> bool {
        self.source.version.load(Ordering::Acquire) > self.last_version
    }

    /// Return the latest value if the source changed since the last poll.
    pub fn poll(&mut self) -> Option<T> {
        let current_version = self.source.version.load(Ordering::Acquire);
        if current_version > self.last_version {
            self.last_version = current_version;
            Some(self.source.value.read().clone())
        } else {
            None
        }
    }

    /// Wait for the next change and return the value at that point.
    pub async fn changed(&mut self) -> T {
        let source = Arc::clone(&self.source);
        loop {
            let notified = source.notify.notified();
            if let Some(value) = self.poll() {
                return value;
            }
            notified.await;
        }
    }

    /// Get the current value regardless of whether it changed.
    pub fn get(&self) -> T {
        self.source.value.read().clone()
    }

    /// Get the last version this subscription observed.
    pub fn last_observed_version(&self) -> u64 {
        self.last_version
    }
}
