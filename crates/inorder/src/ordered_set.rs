//! A mutation-safe, insertion-ordered sequence of values.
//!
//! [`OrderedSet`] is the bookkeeping container behind the broker: it records
//! submission order (push at the tail, peek at the head) and supports
//! removal by value when a result is finally emitted. All operations are
//! mutually exclusive under a single internal lock and are bounded in
//! duration by the number of stored elements.

use crate::Result;
use std::sync::{Arc, Mutex};

/// A thread-safe, insertion-ordered container.
///
/// Cloning the handle shares the underlying storage and lock; use
/// [`Self::duplicate`] for an independent deep copy that can be mutated
/// without affecting the original.
///
/// Each operation comes in two flavors: a convenience form that panics if the
/// internal lock was poisoned, and a fallible `try_*` form returning
/// [`crate::Error::LockPoisoned`] instead.
///
/// # Example
///
/// ```
/// use inorder::OrderedSet;
///
/// let set = OrderedSet::new();
/// set.push("a");
/// set.push("b");
/// set.push("c");
///
/// assert_eq!(set.first(), Some("a"));
/// assert_eq!(set.pop(), Some("c"));
/// assert!(set.remove(&"a"));
/// assert_eq!(set.len(), 1);
/// ```
pub struct OrderedSet<T> {
    items: Arc<Mutex<Vec<T>>>,
}

// Manual impl: a handle clone must not require `T: Clone`.
impl<T> Clone for OrderedSet<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedSet<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates an empty set with pre-allocated backing storage.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    /// Appends `value` at the tail.
    ///
    /// # Panics
    /// Panics if the lock is poisoned. For explicitly fallible behavior, use
    /// [`Self::try_push`] instead.
    pub fn push(&self, value: T) {
        self.try_push(value).unwrap()
    }

    /// A fallible version of [`Self::push`].
    pub fn try_push(&self, value: T) -> Result<()> {
        self.items.lock()?.push(value);
        Ok(())
    }

    /// Removes and returns the newest element (stack order).
    ///
    /// # Panics
    /// Panics if the lock is poisoned. For explicitly fallible behavior, use
    /// [`Self::try_pop`] instead.
    pub fn pop(&self) -> Option<T> {
        self.try_pop().unwrap()
    }

    /// A fallible version of [`Self::pop`].
    pub fn try_pop(&self) -> Result<Option<T>> {
        Ok(self.items.lock()?.pop())
    }

    /// Returns the current number of elements.
    ///
    /// # Panics
    /// Panics if the lock is poisoned. For explicitly fallible behavior, use
    /// [`Self::try_len`] instead.
    pub fn len(&self) -> usize {
        self.try_len().unwrap()
    }

    /// A fallible version of [`Self::len`].
    pub fn try_len(&self) -> Result<usize> {
        Ok(self.items.lock()?.len())
    }

    /// Returns `true` if the set holds no elements.
    ///
    /// # Panics
    /// Panics if the lock is poisoned. For explicitly fallible behavior, use
    /// [`Self::try_is_empty`] instead.
    pub fn is_empty(&self) -> bool {
        self.try_is_empty().unwrap()
    }

    /// A fallible version of [`Self::is_empty`].
    pub fn try_is_empty(&self) -> Result<bool> {
        Ok(self.items.lock()?.is_empty())
    }
}

impl<T: Clone> OrderedSet<T> {
    /// Returns a clone of the oldest element without removing it.
    ///
    /// # Panics
    /// Panics if the lock is poisoned. For explicitly fallible behavior, use
    /// [`Self::try_first`] instead.
    pub fn first(&self) -> Option<T> {
        self.try_first().unwrap()
    }

    /// A fallible version of [`Self::first`].
    pub fn try_first(&self) -> Result<Option<T>> {
        Ok(self.items.lock()?.first().cloned())
    }

    /// Produces an independent deep copy: fresh backing storage, fresh lock.
    ///
    /// The copy is safe to mutate concurrently with the original; neither
    /// side observes the other's changes. Consumers that need to iterate a
    /// point-in-time snapshot without blocking producers should duplicate
    /// first.
    ///
    /// # Panics
    /// Panics if the lock is poisoned. For explicitly fallible behavior, use
    /// [`Self::try_duplicate`] instead.
    pub fn duplicate(&self) -> Self {
        self.try_duplicate().unwrap()
    }

    /// A fallible version of [`Self::duplicate`].
    pub fn try_duplicate(&self) -> Result<Self> {
        let items = self.items.lock()?.clone();
        Ok(Self {
            items: Arc::new(Mutex::new(items)),
        })
    }
}

impl<T: PartialEq> OrderedSet<T> {
    /// Appends `value` at the tail unless an equal element is already
    /// present.
    ///
    /// The check and the insert happen under one lock acquisition, so two
    /// racing callers cannot both land an equal value. Returns `true` if the
    /// value was inserted.
    ///
    /// # Panics
    /// Panics if the lock is poisoned. For explicitly fallible behavior, use
    /// [`Self::try_push_unique`] instead.
    pub fn push_unique(&self, value: T) -> bool {
        self.try_push_unique(value).unwrap()
    }

    /// A fallible version of [`Self::push_unique`].
    pub fn try_push_unique(&self, value: T) -> Result<bool> {
        let mut items = self.items.lock()?;
        if items.contains(&value) {
            return Ok(false);
        }
        items.push(value);
        Ok(true)
    }

    /// Removes the first element equal to `value`.
    ///
    /// Returns `true` if an element was found and removed.
    ///
    /// # Panics
    /// Panics if the lock is poisoned. For explicitly fallible behavior, use
    /// [`Self::try_remove`] instead.
    pub fn remove(&self, value: &T) -> bool {
        self.try_remove(value).unwrap()
    }

    /// A fallible version of [`Self::remove`].
    pub fn try_remove(&self, value: &T) -> Result<bool> {
        let mut items = self.items.lock()?;
        match items.iter().position(|item| item == value) {
            Some(index) => {
                items.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
