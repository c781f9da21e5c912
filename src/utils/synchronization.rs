//! Synchronization primitives for shared module state.
//!
//! Blobs of the same module may be decoded from several threads at once. The only state they
//! share is owned by the module (the resolved-type cache and lists handed between components),
//! and all of it is wrapped in the primitives of this module.
//!
//! # Key Components
//!
//! - [`Lock`] - Non-reentrant exclusive lock with "read" and "write" intent
//! - [`LockGuard`] - Scoped acquisition that releases on every exit path
//! - [`LockState`] - Observable state of a [`Lock`]
//! - [`Guarded`] - Interior-mutable cell serialized by a [`Lock`]
//!
//! # Semantics
//!
//! Both acquisition modes are fully exclusive; the mode only records intent and must match on
//! release. Acquiring a lock that the current thread already holds fails with
//! [`crate::Error::LockRecursion`] instead of deadlocking, and releasing a lock that is not
//! held by the current thread in that mode fails with [`crate::Error::LockUsage`]. Other
//! threads simply block until the holder releases.
//!
//! Without the `thread-safe` feature [`Guarded`] is backed by a [`std::cell::RefCell`] and is
//! neither `Send` nor `Sync`; [`Lock`] itself is always available.
//!
//! # Examples
//!
//! ```rust
//! use declsec::{utils::synchronization::{Lock, LockState}, Error};
//!
//! let lock = Lock::new();
//! {
//!     let _guard = lock.write()?;
//!     assert_eq!(lock.state(), LockState::HeldWrite);
//!     assert!(matches!(lock.enter_read(), Err(Error::LockRecursion)));
//! }
//! assert_eq!(lock.state(), LockState::Free);
//! # Ok::<(), declsec::Error>(())
//! ```

use std::{
    fmt,
    sync::{Condvar, Mutex},
    thread::{self, ThreadId},
};

#[cfg(not(feature = "thread-safe"))]
use std::cell::RefCell;
#[cfg(feature = "thread-safe")]
use std::cell::UnsafeCell;

use crate::{Error, Result};

/// Observable state of a [`Lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Nobody holds the lock
    Free,
    /// Held with read intent
    HeldRead,
    /// Held with write intent
    HeldWrite,
}

#[derive(Debug)]
struct LockInner {
    state: LockState,
    owner: Option<ThreadId>,
}

/// A non-reentrant exclusive lock.
///
/// See the [module documentation](self) for the exact contract.
pub struct Lock {
    inner: Mutex<LockInner>,
    released: Condvar,
}

impl Lock {
    /// Creates a new, free lock.
    #[must_use]
    pub fn new() -> Self {
        Lock {
            inner: Mutex::new(LockInner {
                state: LockState::Free,
                owner: None,
            }),
            released: Condvar::new(),
        }
    }

    /// Returns the current state of the lock.
    ///
    /// A poisoned lock reports the state it had when the poisoning panic occurred.
    pub fn state(&self) -> LockState {
        match self.inner.lock() {
            Ok(inner) => inner.state,
            Err(poisoned) => poisoned.into_inner().state,
        }
    }

    /// Acquires the lock with read intent, blocking while another thread holds it.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockRecursion`] if the current thread already holds the lock and
    /// [`crate::Error::LockError`] if the internal state is poisoned.
    pub fn enter_read(&self) -> Result<()> {
        self.enter(LockState::HeldRead)
    }

    /// Releases a read acquisition.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockUsage`] if the current thread does not hold the lock with
    /// read intent.
    pub fn exit_read(&self) -> Result<()> {
        self.exit(LockState::HeldRead)
    }

    /// Acquires the lock with write intent, blocking while another thread holds it.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockRecursion`] if the current thread already holds the lock and
    /// [`crate::Error::LockError`] if the internal state is poisoned.
    pub fn enter_write(&self) -> Result<()> {
        self.enter(LockState::HeldWrite)
    }

    /// Releases a write acquisition.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockUsage`] if the current thread does not hold the lock with
    /// write intent.
    pub fn exit_write(&self) -> Result<()> {
        self.exit(LockState::HeldWrite)
    }

    /// Scoped read acquisition; the returned guard releases the lock when dropped.
    ///
    /// # Errors
    /// Same conditions as [`Lock::enter_read`].
    pub fn read(&self) -> Result<LockGuard<'_>> {
        self.enter_read()?;
        Ok(LockGuard::new(self, LockState::HeldRead))
    }

    /// Scoped write acquisition; the returned guard releases the lock when dropped.
    ///
    /// # Errors
    /// Same conditions as [`Lock::enter_write`].
    pub fn write(&self) -> Result<LockGuard<'_>> {
        self.enter_write()?;
        Ok(LockGuard::new(self, LockState::HeldWrite))
    }

    fn enter(&self, mode: LockState) -> Result<()> {
        let current = thread::current().id();
        let mut inner = self.inner.lock().map_err(|_| Error::LockError)?;

        loop {
            if inner.state == LockState::Free {
                inner.state = mode;
                inner.owner = Some(current);
                return Ok(());
            }

            if inner.owner == Some(current) {
                return Err(Error::LockRecursion);
            }

            inner = self.released.wait(inner).map_err(|_| Error::LockError)?;
        }
    }

    fn exit(&self, mode: LockState) -> Result<()> {
        let current = thread::current().id();
        let mut inner = self.inner.lock().map_err(|_| Error::LockError)?;

        if inner.state != mode || inner.owner != Some(current) {
            return Err(Error::LockUsage);
        }

        inner.state = LockState::Free;
        inner.owner = None;
        drop(inner);

        self.released.notify_one();
        Ok(())
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock").field("state", &self.state()).finish()
    }
}

/// Scoped acquisition of a [`Lock`].
///
/// Dropping the guard releases the lock, including during unwinding. Use
/// [`LockGuard::release`] to release early and observe usage errors.
#[must_use = "dropping the guard releases the lock immediately"]
pub struct LockGuard<'a> {
    lock: &'a Lock,
    mode: LockState,
    active: bool,
}

impl<'a> LockGuard<'a> {
    fn new(lock: &'a Lock, mode: LockState) -> Self {
        LockGuard {
            lock,
            mode,
            active: true,
        }
    }

    /// Releases the lock now.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockUsage`] if the lock was already released through
    /// [`Lock::exit_read`] or [`Lock::exit_write`] behind the guard's back.
    pub fn release(mut self) -> Result<()> {
        self.active = false;
        self.lock.exit(self.mode)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            // Only fails if someone exited the lock manually, nothing left to release then
            let released = self.lock.exit(self.mode);
            debug_assert!(
                released.is_ok() || thread::panicking(),
                "lock guard dropped after the lock was exited manually"
            );
        }
    }
}

/// A value serialized by a [`Lock`].
///
/// Closures passed to [`Guarded::read`] and [`Guarded::write`] run while the lock is held.
/// Re-entering the same `Guarded` from inside such a closure fails with
/// [`crate::Error::LockRecursion`].
///
/// ```rust
/// use declsec::utils::synchronization::Guarded;
///
/// let counter = Guarded::new(0u32);
/// counter.write(|value| *value += 1)?;
/// assert_eq!(counter.read(|value| *value)?, 1);
/// # Ok::<(), declsec::Error>(())
/// ```
#[cfg(feature = "thread-safe")]
pub struct Guarded<T> {
    lock: Lock,
    value: UnsafeCell<T>,
}

// SAFETY: every access to `value` through a shared reference happens while `lock` is held,
// and `Lock` admits a single holder at a time regardless of mode. This mirrors `Mutex<T>`.
#[cfg(feature = "thread-safe")]
unsafe impl<T: Send> Send for Guarded<T> {}
#[cfg(feature = "thread-safe")]
unsafe impl<T: Send> Sync for Guarded<T> {}

#[cfg(feature = "thread-safe")]
impl<T> Guarded<T> {
    /// Wraps `value`.
    pub fn new(value: T) -> Self {
        Guarded {
            lock: Lock::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Runs `f` with shared access to the value.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockRecursion`] when called from within another closure on the
    /// same `Guarded`, or [`crate::Error::LockError`] if the lock is poisoned.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let _guard = self.lock.read()?;
        // SAFETY: the lock is held exclusively until `_guard` drops
        let value = unsafe { &*self.value.get() };
        Ok(f(value))
    }

    /// Runs `f` with exclusive access to the value.
    ///
    /// # Errors
    /// Same conditions as [`Guarded::read`].
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let _guard = self.lock.write()?;
        // SAFETY: the lock is held exclusively until `_guard` drops
        let value = unsafe { &mut *self.value.get() };
        Ok(f(value))
    }

    /// Direct access through a unique borrow; no locking needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Consumes the cell and returns the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

/// A value behind a [`std::cell::RefCell`], for single-threaded builds.
///
/// Keeps the contract of the thread-safe variant: any nested access reports
/// [`crate::Error::LockRecursion`], read or write.
#[cfg(not(feature = "thread-safe"))]
pub struct Guarded<T> {
    value: RefCell<T>,
}

#[cfg(not(feature = "thread-safe"))]
impl<T> Guarded<T> {
    /// Wraps `value`.
    pub fn new(value: T) -> Self {
        Guarded {
            value: RefCell::new(value),
        }
    }

    /// Runs `f` with shared access to the value.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockRecursion`] when called from within another closure on the
    /// same `Guarded`.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let value = self
            .value
            .try_borrow_mut()
            .map_err(|_| Error::LockRecursion)?;
        Ok(f(&value))
    }

    /// Runs `f` with exclusive access to the value.
    ///
    /// # Errors
    /// Same conditions as [`Guarded::read`].
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut value = self
            .value
            .try_borrow_mut()
            .map_err(|_| Error::LockRecursion)?;
        Ok(f(&mut value))
    }

    /// Direct access through a unique borrow.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Consumes the cell and returns the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for Guarded<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.read(|value| format!("{:?}", value)) {
            Ok(value) => write!(f, "Guarded {{ value: {} }}", value),
            Err(_) => f.write_str("Guarded { <locked> }"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    #[test]
    fn test_lock_recursion_detected() {
        let lock = Lock::new();

        lock.enter_read().unwrap();
        assert!(matches!(lock.enter_read(), Err(Error::LockRecursion)));
        assert!(matches!(lock.enter_write(), Err(Error::LockRecursion)));
        lock.exit_read().unwrap();

        lock.enter_write().unwrap();
        assert!(matches!(lock.enter_write(), Err(Error::LockRecursion)));
        assert!(matches!(lock.enter_read(), Err(Error::LockRecursion)));
        lock.exit_write().unwrap();

        assert_eq!(lock.state(), LockState::Free);
    }

    #[test]
    fn test_lock_unbalanced_release() {
        let lock = Lock::new();
        assert!(matches!(lock.exit_read(), Err(Error::LockUsage)));
        assert!(matches!(lock.exit_write(), Err(Error::LockUsage)));

        lock.enter_write().unwrap();
        assert!(matches!(lock.exit_read(), Err(Error::LockUsage)));
        assert_eq!(lock.state(), LockState::HeldWrite);
        lock.exit_write().unwrap();
        assert!(matches!(lock.exit_write(), Err(Error::LockUsage)));
    }

    #[test]
    fn test_lock_reacquire() {
        let lock = Lock::new();
        for _ in 0..3 {
            lock.enter_read().unwrap();
            lock.exit_read().unwrap();
            lock.enter_write().unwrap();
            lock.exit_write().unwrap();
        }
        assert_eq!(lock.state(), LockState::Free);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = Lock::new();
        {
            let _guard = lock.read().unwrap();
            assert_eq!(lock.state(), LockState::HeldRead);
        }
        assert_eq!(lock.state(), LockState::Free);

        let guard = lock.write().unwrap();
        guard.release().unwrap();
        assert_eq!(lock.state(), LockState::Free);
    }

    #[test]
    fn test_guard_release_after_manual_exit() {
        let lock = Lock::new();
        let guard = lock.write().unwrap();
        lock.exit_write().unwrap();
        assert!(matches!(guard.release(), Err(Error::LockUsage)));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "lock guard dropped after the lock was exited manually")]
    fn test_guard_drop_after_manual_exit_asserts() {
        let lock = Lock::new();
        let _guard = lock.read().unwrap();
        lock.exit_read().unwrap();
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let lock = Lock::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lock.write().unwrap();
            panic!("decode failure");
        }));

        assert!(result.is_err());
        assert_eq!(lock.state(), LockState::Free);
    }

    #[test]
    fn test_release_from_other_thread_rejected() {
        let lock = Lock::new();
        lock.enter_write().unwrap();

        std::thread::scope(|scope| {
            let result = scope.spawn(|| lock.exit_write()).join().unwrap();
            assert!(matches!(result, Err(Error::LockUsage)));
        });

        lock.exit_write().unwrap();
    }

    #[test]
    fn test_other_thread_blocks_until_release() {
        let lock = Arc::new(Lock::new());
        let acquired = Arc::new(AtomicBool::new(false));

        lock.enter_read().unwrap();

        let handle = {
            let lock = Arc::clone(&lock);
            let acquired = Arc::clone(&acquired);
            std::thread::spawn(move || {
                lock.enter_write().unwrap();
                acquired.store(true, Ordering::SeqCst);
                lock.exit_write().unwrap();
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        lock.exit_read().unwrap();
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(lock.state(), LockState::Free);
    }

    #[test]
    fn test_guarded_nested_access_rejected() {
        let guarded = Guarded::new(vec![1, 2, 3]);

        let nested = guarded
            .read(|_| guarded.read(|values| values.len()))
            .unwrap();
        assert!(matches!(nested, Err(Error::LockRecursion)));

        let nested = guarded.write(|_| guarded.write(|values| values.clear())).unwrap();
        assert!(matches!(nested, Err(Error::LockRecursion)));

        assert_eq!(guarded.read(|values| values.len()).unwrap(), 3);
    }

    #[test]
    fn test_guarded_into_inner() {
        let mut guarded = Guarded::new(String::from("a"));
        guarded.get_mut().push('b');
        guarded.write(|value| value.push('c')).unwrap();
        assert_eq!(guarded.into_inner(), "abc");
    }

    #[cfg(feature = "thread-safe")]
    #[test]
    fn test_guarded_concurrent_writes() {
        let guarded = Guarded::new(0usize);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        guarded.write(|value| *value += 1).unwrap();
                    }
                });
            }
        });

        assert_eq!(guarded.read(|value| *value).unwrap(), 8000);
    }
}
