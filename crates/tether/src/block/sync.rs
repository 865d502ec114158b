//! Thread-safe control block.
//!
//! Counts live behind a `parking_lot::Mutex` rather than in atomics: every
//! transition reads and writes several fields together (strong count, phase,
//! data pointer), and a short critical section keeps those transitions
//! obviously consistent without compare-and-swap retry loops.
//!
//! The deleter never runs under the count mutex or the reseat lock, so a
//! destructor may lock weak references and reseat atomic slots, including
//! slots that other threads are contending for.

use std::fmt;
use std::ptr::{self, NonNull};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

use super::{private, BlockHooks, ControlBlock, Phase};

/// State guarded by the count mutex.
struct Counts {
    data: *mut (),
    strong: usize,
    weak: usize,
    phase: Phase,
}

impl Counts {
    /// Moves a live value to the destroying phase and hands out its pointer.
    fn begin_destroy(&mut self) -> Option<*mut ()> {
        if self.phase != Phase::Live || self.data.is_null() {
            return None;
        }
        self.phase = Phase::Destroying;
        Some(std::mem::replace(&mut self.data, ptr::null_mut()))
    }
}

/// A control block safe to share between threads.
pub struct SyncBlock {
    counts: Mutex<Counts>,
    reseat: ReentrantMutex<()>,
    lockable: bool,
    hooks: BlockHooks<Self>,
}

// SAFETY: the raw data pointer is only read or written under `counts`, and
// the façades built on this block require `T: Send + Sync` before they are
// themselves `Send` or `Sync`.
unsafe impl Send for SyncBlock {}
// SAFETY: see above.
unsafe impl Sync for SyncBlock {}

impl private::Sealed for SyncBlock {}

impl SyncBlock {
    /// Runs the deleter for `data` outside the count mutex, then marks the
    /// value dead. Returns whether no weak references remain, decided in the
    /// same critical section that ends the destroying phase.
    unsafe fn run_deleter(&self, data: *mut ()) -> bool {
        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_destroy_start(self.hooks.type_name, self.weak());

        // SAFETY: `data` was taken out of a live block by `begin_destroy`.
        unsafe { (self.hooks.drop_value)(data) };

        let mut counts = self.counts.lock();
        counts.phase = Phase::Dead;

        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_destroy_end(self.hooks.type_name, counts.weak);

        counts.weak == 0
    }
}

impl ControlBlock for SyncBlock {
    type ReseatGuard<'a> = ReentrantMutexGuard<'a, ()>;

    fn with_hooks(hooks: BlockHooks<Self>, lockable: bool) -> Self {
        Self {
            counts: Mutex::new(Counts {
                data: ptr::null_mut(),
                strong: 0,
                weak: 0,
                phase: Phase::Constructing,
            }),
            reseat: ReentrantMutex::new(()),
            lockable,
            hooks,
        }
    }

    fn hooks(&self) -> BlockHooks<Self> {
        self.hooks
    }

    unsafe fn activate(&self, data: NonNull<()>) {
        let mut counts = self.counts.lock();
        debug_assert_eq!(counts.phase, Phase::Constructing);
        counts.data = data.as_ptr();
        counts.strong = 1;
        counts.phase = Phase::Live;
    }

    unsafe fn abandon(&self) {
        let mut counts = self.counts.lock();
        debug_assert_eq!(counts.phase, Phase::Constructing);
        counts.phase = Phase::Dead;
    }

    fn reseat_lock(&self) -> Self::ReseatGuard<'_> {
        self.reseat.lock()
    }

    fn increment_strong(&self) -> bool {
        let mut counts = self.counts.lock();
        if counts.strong == 0 {
            return false;
        }
        match counts.strong.checked_add(1) {
            Some(next) => {
                counts.strong = next;
                true
            }
            None => false,
        }
    }

    unsafe fn decrement_strong(&self) -> bool {
        let data = {
            let mut counts = self.counts.lock();
            debug_assert!(counts.strong > 0, "strong count underflow");
            if counts.strong == 0 {
                return false;
            }
            counts.strong -= 1;
            if counts.strong > 0 {
                return false;
            }
            match counts.begin_destroy() {
                Some(data) => data,
                // Destroyed early through `destroy`; only the block remains.
                None => return counts.weak == 0 && counts.phase == Phase::Dead,
            }
        };

        // SAFETY: the last strong reference is gone.
        unsafe { self.run_deleter(data) }
    }

    fn increment_weak(&self) -> bool {
        let mut counts = self.counts.lock();
        if counts.phase == Phase::Dead {
            return false;
        }
        match counts.weak.checked_add(1) {
            Some(next) => {
                counts.weak = next;
                true
            }
            None => false,
        }
    }

    unsafe fn decrement_weak(&self) -> bool {
        let mut counts = self.counts.lock();
        debug_assert!(counts.weak > 0, "weak count underflow");
        if counts.weak == 0 {
            return false;
        }
        counts.weak -= 1;
        counts.weak == 0 && counts.strong == 0 && counts.phase == Phase::Dead
    }

    unsafe fn destroy(&self) {
        let data = self.counts.lock().begin_destroy();
        if let Some(data) = data {
            // SAFETY: forwarded to the caller.
            unsafe { self.run_deleter(data) };
        }
    }

    fn data(&self) -> *mut () {
        self.counts.lock().data
    }

    fn strong(&self) -> usize {
        self.counts.lock().strong
    }

    fn weak(&self) -> usize {
        self.counts.lock().weak
    }

    fn lockable(&self) -> bool {
        self.lockable
    }

    fn destroying(&self) -> bool {
        self.counts.lock().phase == Phase::Destroying
    }
}

impl fmt::Debug for SyncBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.counts.lock();
        f.debug_struct("SyncBlock")
            .field("type_name", &self.hooks.type_name)
            .field("strong", &counts.strong)
            .field("weak", &counts.weak)
            .field("phase", &counts.phase)
            .field("lockable", &self.lockable)
            .finish_non_exhaustive()
    }
}
