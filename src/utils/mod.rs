//! Utility infrastructure shared by the decoders.
//!
//! - [`synchronization`] - the non-reentrant [`Lock`] and the [`Guarded`] cell
//! - [`collections`] - the [`OrderedList`] capability and the build-selected [`List`]

pub mod collections;
pub mod synchronization;

pub use collections::{List, LockedList, OrderedList};
pub use synchronization::{Guarded, Lock, LockGuard, LockState};
