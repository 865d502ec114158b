//! Thread-safe pointer façades.
//!
//! [`AtomicSharedPtr`] and [`AtomicWeakPtr`] are [`crate::Shared`] and
//! [`crate::Weak`] instantiated over [`SyncBlock`]: counts are updated under
//! the block's mutex, and strong acquisition (clone, weak lock) holds the
//! block's re-entrant reseat lock. A weak lock on another thread never
//! observes a value halfway through its deleter: the phase and data pointer
//! it checks change under the count mutex. Releases take neither lock across
//! the deleter, so destructors are free to touch atomic slots.
//!
//! Rust's borrow rules already stop two threads from reassigning the same
//! façade value through `&mut`. When one slot really must be reseated from
//! several threads at once, use [`AtomicSharedCell`] or [`AtomicWeakCell`]:
//! they offer `load`/`store`/`swap`/`take` through `&self`.
//!
//! Only the pointer bookkeeping is synchronised. Holding a strong reference
//! guarantees the value is not destroyed, but concurrent reads and writes
//! of the value itself need their own synchronisation (`Mutex`, atomics).
//!
//! # Examples
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::thread;
//!
//! use tether::{make_atomic_shared, AtomicSharedPtr};
//!
//! let counter = make_atomic_shared(AtomicUsize::new(0));
//! let workers: Vec<_> = (0..4)
//!     .map(|_| {
//!         let counter = AtomicSharedPtr::clone(&counter);
//!         thread::spawn(move || {
//!             counter.fetch_add(1, Ordering::SeqCst);
//!         })
//!     })
//!     .collect();
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//! assert_eq!(counter.load(Ordering::SeqCst), 4);
//! assert_eq!(AtomicSharedPtr::strong_count(&counter), 1);
//! ```

use std::fmt;
use std::mem;

use parking_lot::Mutex;

use crate::block::{ControlBlock, SyncBlock};
use crate::ptr::{Shared, Unique, Weak};

/// A thread-safe shared pointer.
pub type AtomicSharedPtr<T> = Shared<T, SyncBlock>;

/// A thread-safe weak pointer.
pub type AtomicWeakPtr<T> = Weak<T, SyncBlock>;

/// A thread-safe exclusive pointer.
pub type AtomicUniquePtr<T> = Unique<T, SyncBlock>;

/// Allocates `value` together with a thread-safe control block and returns
/// the first shared reference to it.
#[must_use]
pub fn make_atomic_shared<T>(value: T) -> AtomicSharedPtr<T> {
    Shared::new(value)
}

// ============================================================================
// Send + Sync trait implementations
// ============================================================================

// SAFETY: counts and reseating are synchronised by `SyncBlock`. Clones on
// several threads give out `&T` concurrently and the last one may drop `T`
// on any thread, hence `T: Send + Sync`.
unsafe impl<T: Send + Sync> Send for Shared<T, SyncBlock> {}
// SAFETY: see above.
unsafe impl<T: Send + Sync> Sync for Shared<T, SyncBlock> {}
// SAFETY: a weak reference can be locked into a `Shared` on any thread.
unsafe impl<T: Send + Sync> Send for Weak<T, SyncBlock> {}
// SAFETY: see above.
unsafe impl<T: Send + Sync> Sync for Weak<T, SyncBlock> {}
// SAFETY: a `Unique` is the only owner; it moves `T` like a `Box` does.
unsafe impl<T: Send> Send for Unique<T, SyncBlock> {}
// SAFETY: `&Unique<T>` only gives out `&T`.
unsafe impl<T: Sync> Sync for Unique<T, SyncBlock> {}

/// Acquires the reseat lock of the block `shared` references, if any.
///
/// The returned guard is not tied to `shared`'s borrow, so the caller can
/// replace the slot while holding it; the caller must keep the old value
/// alive until the guard is dropped.
fn reseat_guard<'a>(
    block: Option<std::ptr::NonNull<SyncBlock>>,
) -> Option<<SyncBlock as ControlBlock>::ReseatGuard<'a>> {
    // SAFETY: the caller keeps a reference to the block alive for 'a.
    block.map(|block| unsafe { block.as_ref() }.reseat_lock())
}

// ============================================================================
// AtomicSharedCell<T> - concurrently reseatable shared slot
// ============================================================================

/// A shared-pointer slot that several threads may read and reseat at once.
///
/// Every operation briefly locks the slot, and reseating additionally holds
/// the reseat lock of the block being replaced. The previous value is
/// released after the slot lock is gone, and releasing it takes no reseat
/// lock, so its destructor runs with neither held.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use tether::{make_atomic_shared, AtomicSharedCell};
///
/// let current = Arc::new(AtomicSharedCell::new(make_atomic_shared(1)));
/// let writer = thread::spawn({
///     let current = Arc::clone(&current);
///     move || current.store(make_atomic_shared(2))
/// });
/// let seen = *current.load();
/// writer.join().unwrap();
///
/// assert!(seen == 1 || seen == 2);
/// assert_eq!(*current.load(), 2);
/// ```
pub struct AtomicSharedCell<T> {
    slot: Mutex<AtomicSharedPtr<T>>,
}

impl<T> AtomicSharedCell<T> {
    /// Creates a cell holding `ptr`.
    #[must_use]
    pub const fn new(ptr: AtomicSharedPtr<T>) -> Self {
        Self {
            slot: Mutex::new(ptr),
        }
    }

    /// Creates an empty cell.
    #[must_use]
    pub const fn null() -> Self {
        Self::new(Shared::null())
    }

    /// Returns a new strong reference to the current value.
    #[must_use]
    pub fn load(&self) -> AtomicSharedPtr<T> {
        self.slot.lock().clone()
    }

    /// Returns a weak reference to the current value.
    #[must_use]
    pub fn downgrade(&self) -> AtomicWeakPtr<T> {
        Shared::downgrade(&self.slot.lock())
    }

    /// Replaces the current value with `ptr`, releasing the old one.
    pub fn store(&self, ptr: AtomicSharedPtr<T>) {
        drop(self.swap(ptr));
    }

    /// Replaces the current value with `ptr` and returns the old one.
    pub fn swap(&self, ptr: AtomicSharedPtr<T>) -> AtomicSharedPtr<T> {
        let mut slot = self.slot.lock();
        let _reseat = reseat_guard(Shared::block_ptr(&slot));
        mem::replace(&mut *slot, ptr)
    }

    /// Empties the cell and returns the value it held.
    pub fn take(&self) -> AtomicSharedPtr<T> {
        self.swap(Shared::null())
    }

    /// Empties the cell, releasing the value it held.
    pub fn reset(&self) {
        drop(self.take());
    }

    /// Returns `true` if the cell currently holds a live value.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        Shared::is_valid(&self.slot.lock())
    }

    /// Borrows the slot mutably; no locking is needed with `&mut self`.
    pub fn get_mut(&mut self) -> &mut AtomicSharedPtr<T> {
        self.slot.get_mut()
    }

    /// Consumes the cell, returning its value.
    #[must_use]
    pub fn into_inner(self) -> AtomicSharedPtr<T> {
        self.slot.into_inner()
    }
}

impl<T> Default for AtomicSharedCell<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<AtomicSharedPtr<T>> for AtomicSharedCell<T> {
    fn from(ptr: AtomicSharedPtr<T>) -> Self {
        Self::new(ptr)
    }
}

impl<T> fmt::Debug for AtomicSharedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicSharedCell")
            .field("valid", &self.is_valid())
            .finish()
    }
}

// ============================================================================
// AtomicWeakCell<T> - concurrently reseatable weak slot
// ============================================================================

/// A weak-pointer slot that several threads may read, lock and reseat at
/// once.
///
/// A value that stores an `AtomicWeakCell` pointing at itself can be torn
/// down safely: its destructor may even call [`AtomicWeakCell::lock`], which
/// returns `None`.
pub struct AtomicWeakCell<T> {
    slot: Mutex<AtomicWeakPtr<T>>,
}

impl<T> AtomicWeakCell<T> {
    /// Creates a cell holding `ptr`.
    #[must_use]
    pub const fn new(ptr: AtomicWeakPtr<T>) -> Self {
        Self {
            slot: Mutex::new(ptr),
        }
    }

    /// Creates an empty cell.
    #[must_use]
    pub const fn null() -> Self {
        Self::new(Weak::new())
    }

    /// Attempts to obtain a strong reference to the current value.
    #[must_use]
    pub fn lock(&self) -> Option<AtomicSharedPtr<T>> {
        self.slot.lock().lock()
    }

    /// Returns a copy of the current weak reference.
    #[must_use]
    pub fn load(&self) -> AtomicWeakPtr<T> {
        self.slot.lock().clone()
    }

    /// Replaces the current reference with `ptr`, releasing the old one.
    pub fn store(&self, ptr: AtomicWeakPtr<T>) {
        drop(self.swap(ptr));
    }

    /// Points the cell at the value `shared` references.
    pub fn store_shared(&self, shared: &AtomicSharedPtr<T>) {
        self.store(Shared::downgrade(shared));
    }

    /// Replaces the current reference with `ptr` and returns the old one.
    pub fn swap(&self, ptr: AtomicWeakPtr<T>) -> AtomicWeakPtr<T> {
        let mut slot = self.slot.lock();
        let _reseat = reseat_guard(slot.block_ptr());
        mem::replace(&mut *slot, ptr)
    }

    /// Empties the cell and returns the reference it held.
    pub fn take(&self) -> AtomicWeakPtr<T> {
        self.swap(Weak::new())
    }

    /// Empties the cell, releasing the reference it held.
    pub fn reset(&self) {
        drop(self.take());
    }

    /// Returns `true` if the referenced value can no longer be observed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.slot.lock().expired()
    }

    /// Borrows the slot mutably; no locking is needed with `&mut self`.
    pub fn get_mut(&mut self) -> &mut AtomicWeakPtr<T> {
        self.slot.get_mut()
    }

    /// Consumes the cell, returning its reference.
    #[must_use]
    pub fn into_inner(self) -> AtomicWeakPtr<T> {
        self.slot.into_inner()
    }
}

impl<T> Default for AtomicWeakCell<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<AtomicWeakPtr<T>> for AtomicWeakCell<T> {
    fn from(ptr: AtomicWeakPtr<T>) -> Self {
        Self::new(ptr)
    }
}

impl<T> fmt::Debug for AtomicWeakCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicWeakCell")
            .field("expired", &self.expired())
            .finish()
    }
}
