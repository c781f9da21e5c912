//! Ordered, appendable collections with a build-selected representation.
//!
//! Decoders build their results through the [`OrderedList`] trait and never branch on the
//! concurrency mode themselves. The concrete type is picked once per build through the
//! [`List`] alias:
//!
//! | Feature `thread-safe` | `List<T>`          |
//! |-----------------------|--------------------|
//! | enabled (default)     | [`LockedList<T>`]  |
//! | disabled              | `Vec<T>`           |
//!
//! # Examples
//!
//! ```rust
//! use declsec::utils::collections::{List, OrderedList};
//!
//! let mut list = List::<u32>::with_capacity(2);
//! list.push(7);
//! list.push(9);
//!
//! assert_eq!(list.len(), 2);
//! assert_eq!(list.to_vec(), vec![7, 9]);
//! ```

use crate::{utils::synchronization::Guarded, Result};

/// Capability of an insertion-ordered, appendable collection.
pub trait OrderedList<T>: Default {
    /// Creates an empty collection with room for `capacity` items.
    fn with_capacity(capacity: usize) -> Self;

    /// Appends `item` at the end.
    fn push(&mut self, item: T);

    /// Number of items.
    fn len(&self) -> usize;

    /// Returns `true` if the collection holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the items, in insertion order, into a `Vec`.
    fn to_vec(&self) -> Vec<T>
    where
        T: Clone;
}

impl<T> OrderedList<T> for Vec<T> {
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }

    fn push(&mut self, item: T) {
        Vec::push(self, item);
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_slice().to_vec()
    }
}

/// An ordered list whose items live behind a [`Guarded`] cell.
///
/// Besides the [`OrderedList`] operations, a `LockedList` can be appended to through a shared
/// reference with [`LockedList::append`], which is what allows several consumers to feed one
/// list.
///
/// The infallible [`OrderedList`] methods panic if they are called from inside a closure that
/// already holds the list, which cannot happen through the public API of this type.
#[derive(Debug)]
pub struct LockedList<T> {
    items: Guarded<Vec<T>>,
}

impl<T> LockedList<T> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        LockedList {
            items: Guarded::new(Vec::new()),
        }
    }

    /// Appends `item` through a shared reference.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the underlying lock is poisoned.
    pub fn append(&self, item: T) -> Result<()> {
        self.items.write(|items| items.push(item))
    }

    /// Returns a copy of the item at `index`, if any.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the underlying lock is poisoned.
    pub fn get(&self, index: usize) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.items.read(|items| items.get(index).cloned())
    }

    /// Returns a copy of all items in insertion order.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the underlying lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.items.read(|items| items.clone())
    }

    /// Consumes the list and returns its items.
    pub fn into_vec(self) -> Vec<T> {
        self.items.into_inner()
    }
}

impl<T> OrderedList<T> for LockedList<T> {
    fn with_capacity(capacity: usize) -> Self {
        LockedList {
            items: Guarded::new(Vec::with_capacity(capacity)),
        }
    }

    fn push(&mut self, item: T) {
        self.items.get_mut().push(item);
    }

    fn len(&self) -> usize {
        with_read!(self.items, |items: &Vec<T>| items.len())
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        with_read!(self.items, |items: &Vec<T>| items.clone())
    }
}

impl<T> Default for LockedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for LockedList<T> {
    fn from(items: Vec<T>) -> Self {
        LockedList {
            items: Guarded::new(items),
        }
    }
}

impl<T: Clone> Clone for LockedList<T> {
    fn clone(&self) -> Self {
        Self::from(self.to_vec())
    }
}

// Compares snapshots so two lists are never locked at the same time
impl<T: PartialEq + Clone> PartialEq for LockedList<T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.to_vec() == other.to_vec()
    }
}

/// Build-selected list type; see the [module documentation](self).
#[cfg(feature = "thread-safe")]
pub type List<T> = LockedList<T>;

/// Build-selected list type; see the [module documentation](self).
#[cfg(not(feature = "thread-safe"))]
pub type List<T> = Vec<T>;
