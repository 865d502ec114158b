//! Single-threaded control block.

use std::cell::Cell;
use std::fmt;
use std::ptr::{self, NonNull};

use super::{private, BlockHooks, ControlBlock, Phase};

/// A control block with unsynchronised `Cell` counters.
///
/// `LocalBlock` is `!Send` and `!Sync`, so every façade built on it is
/// confined to the thread that created it.
pub struct LocalBlock {
    data: Cell<*mut ()>,
    strong: Cell<usize>,
    weak: Cell<usize>,
    phase: Cell<Phase>,
    lockable: bool,
    hooks: BlockHooks<Self>,
}

impl private::Sealed for LocalBlock {}

impl ControlBlock for LocalBlock {
    type ReseatGuard<'a> = ();

    fn with_hooks(hooks: BlockHooks<Self>, lockable: bool) -> Self {
        Self {
            data: Cell::new(ptr::null_mut()),
            strong: Cell::new(0),
            weak: Cell::new(0),
            phase: Cell::new(Phase::Constructing),
            lockable,
            hooks,
        }
    }

    fn hooks(&self) -> BlockHooks<Self> {
        self.hooks
    }

    unsafe fn activate(&self, data: NonNull<()>) {
        debug_assert_eq!(self.phase.get(), Phase::Constructing);
        self.data.set(data.as_ptr());
        self.strong.set(1);
        self.phase.set(Phase::Live);
    }

    unsafe fn abandon(&self) {
        debug_assert_eq!(self.phase.get(), Phase::Constructing);
        self.phase.set(Phase::Dead);
    }

    fn reseat_lock(&self) -> Self::ReseatGuard<'_> {}

    fn increment_strong(&self) -> bool {
        let strong = self.strong.get();
        if strong == 0 {
            return false;
        }
        match strong.checked_add(1) {
            Some(next) => {
                self.strong.set(next);
                true
            }
            None => false,
        }
    }

    unsafe fn decrement_strong(&self) -> bool {
        let strong = self.strong.get();
        debug_assert!(strong > 0, "strong count underflow");
        if strong == 0 {
            return false;
        }
        self.strong.set(strong - 1);
        if strong > 1 {
            return false;
        }

        // SAFETY: the last strong reference is gone.
        unsafe { self.destroy() };
        self.weak.get() == 0
    }

    fn increment_weak(&self) -> bool {
        if self.phase.get() == Phase::Dead {
            return false;
        }
        match self.weak.get().checked_add(1) {
            Some(next) => {
                self.weak.set(next);
                true
            }
            None => false,
        }
    }

    unsafe fn decrement_weak(&self) -> bool {
        let weak = self.weak.get();
        debug_assert!(weak > 0, "weak count underflow");
        if weak == 0 {
            return false;
        }
        self.weak.set(weak - 1);
        weak == 1 && self.strong.get() == 0 && self.phase.get() == Phase::Dead
    }

    unsafe fn destroy(&self) {
        if self.phase.get() != Phase::Live || self.data.get().is_null() {
            return;
        }

        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_destroy_start(self.hooks.type_name, self.weak.get());

        self.phase.set(Phase::Destroying);
        let data = self.data.replace(ptr::null_mut());
        // SAFETY: `data` is the live value; the strong count is zero so no
        // façade dereferences it any more.
        unsafe { (self.hooks.drop_value)(data) };
        self.phase.set(Phase::Dead);

        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_destroy_end(self.hooks.type_name, self.weak.get());
    }

    fn data(&self) -> *mut () {
        self.data.get()
    }

    fn strong(&self) -> usize {
        self.strong.get()
    }

    fn weak(&self) -> usize {
        self.weak.get()
    }

    fn lockable(&self) -> bool {
        self.lockable
    }

    fn destroying(&self) -> bool {
        self.phase.get() == Phase::Destroying
    }
}

impl fmt::Debug for LocalBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBlock")
            .field("type_name", &self.hooks.type_name)
            .field("strong", &self.strong.get())
            .field("weak", &self.weak.get())
            .field("phase", &self.phase.get())
            .field("lockable", &self.lockable)
            .finish()
    }
}
