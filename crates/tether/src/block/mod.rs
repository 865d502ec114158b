//! Reference-counting control blocks.
//!
//! Every allocation made by this crate is an [`RcBox`]: a control block
//! header followed by the owned value. The header tracks the strong and weak
//! counts, the (nullable) pointer to the value and a lifecycle phase. Two
//! implementations exist:
//!
//! - [`LocalBlock`]: plain `Cell` bookkeeping, single-threaded only.
//! - [`SyncBlock`]: counts behind a `parking_lot::Mutex`, plus a re-entrant
//!   reseat lock that serialises changes to which block a façade references.
//!
//! The pointer façades ([`crate::Shared`], [`crate::Weak`] and
//! [`crate::Unique`]) are generic over [`ControlBlock`] and never touch the
//! counts except through its methods.

mod local;
mod sync;

use std::fmt;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

pub use local::LocalBlock;
pub use sync::SyncBlock;

mod private {
    pub trait Sealed {}
}

// ============================================================================
// Phase - lifecycle of the owned value
// ============================================================================

/// Lifecycle of the value owned by a control block.
///
/// `destroying` in the public accessors corresponds to
/// [`Phase::Destroying`]; the other phases distinguish "not yet built" from
/// "already gone", which a plain alive/dead flag cannot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Allocated, value not yet written (`new_cyclic` closure running).
    Constructing,
    /// Value written and owned by at least one strong reference.
    Live,
    /// The deleter is running.
    Destroying,
    /// The value has been dropped (or was never built).
    Dead,
}

// ============================================================================
// BlockHooks - type-erased operations on the owned value
// ============================================================================

/// Type-erased operations recorded in a block when it is allocated.
pub struct BlockHooks<C> {
    /// Drops the value in place.
    pub(crate) drop_value: unsafe fn(*mut ()),
    /// Frees the whole `RcBox` allocation, header included.
    pub(crate) dealloc: unsafe fn(NonNull<C>),
    /// Name of the owned type, for diagnostics.
    pub(crate) type_name: &'static str,
}

impl<C> Clone for BlockHooks<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for BlockHooks<C> {}

impl<C> fmt::Debug for BlockHooks<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHooks")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ControlBlock - the seam between façades and bookkeeping
// ============================================================================

/// Reference-count bookkeeping for one allocation.
///
/// This trait is sealed: the crate provides [`LocalBlock`] and
/// [`SyncBlock`]. It is public so that façades can be named generically
/// (`Shared<T, C>`) and so callers can inspect a block through
/// [`crate::Shared::control_block`].
///
/// The strong and weak counts follow these rules:
///
/// - A strong increment fails once the strong count has reached zero.
/// - When the strong count drops to zero the value is destroyed, and the
///   block must be freed if no weak references remain.
/// - A weak decrement asks for the block to be freed only when both counts
///   are zero and the value is not being destroyed. A weak reference created
///   and dropped from inside the value's own destructor therefore never
///   frees the block underneath the running deleter.
pub trait ControlBlock: private::Sealed + Sized + 'static {
    /// Guard returned by [`ControlBlock::reseat_lock`].
    type ReseatGuard<'a>
    where
        Self: 'a;

    #[doc(hidden)]
    fn with_hooks(hooks: BlockHooks<Self>, lockable: bool) -> Self;

    #[doc(hidden)]
    fn hooks(&self) -> BlockHooks<Self>;

    /// Moves a freshly allocated block to the live phase with one strong
    /// reference.
    ///
    /// # Safety
    ///
    /// `data` must point to an initialised value owned by this block, and
    /// the block must still be constructing.
    #[doc(hidden)]
    unsafe fn activate(&self, data: NonNull<()>);

    /// Marks a block whose value was never written as dead.
    ///
    /// # Safety
    ///
    /// The block must still be constructing.
    #[doc(hidden)]
    unsafe fn abandon(&self);

    /// Acquires the block's reseat lock.
    ///
    /// Held while a façade changes which block it references and while a
    /// strong reference is acquired. Never held across the deleter. For
    /// [`LocalBlock`] this is a no-op.
    fn reseat_lock(&self) -> Self::ReseatGuard<'_>;

    /// Adds a strong reference.
    ///
    /// Returns `false` if the strong count is already zero. The caller must
    /// then discard its pointer to the block instead of building an owning
    /// façade from it.
    fn increment_strong(&self) -> bool;

    /// Removes a strong reference, destroying the value when it was the last.
    ///
    /// Returns `true` if the block itself must now be freed.
    ///
    /// # Safety
    ///
    /// The caller must own one of the strong references being counted.
    unsafe fn decrement_strong(&self) -> bool;

    /// Adds a weak reference.
    ///
    /// Returns `false` once the value is dead and no strong references can
    /// ever exist again.
    fn increment_weak(&self) -> bool;

    /// Removes a weak reference.
    ///
    /// Returns `true` if the block itself must now be freed.
    ///
    /// # Safety
    ///
    /// The caller must own one of the weak references being counted.
    unsafe fn decrement_weak(&self) -> bool;

    /// Drops the owned value in place.
    ///
    /// Idempotent: does nothing if the value is already being destroyed or
    /// the data pointer is null. The data pointer is nulled before the
    /// deleter runs, and [`ControlBlock::destroying`] reports `true` for the
    /// duration of the deleter.
    ///
    /// # Safety
    ///
    /// No strong reference may be dereferenced after this call.
    unsafe fn destroy(&self);

    /// Current pointer to the owned value, or null once destroyed.
    fn data(&self) -> *mut ();

    /// Current strong count.
    fn strong(&self) -> usize;

    /// Current weak count.
    fn weak(&self) -> usize;

    /// Whether weak references to this block may ever be locked.
    ///
    /// `false` for blocks backing [`crate::Unique`].
    fn lockable(&self) -> bool;

    /// Whether the owned value's deleter is running right now.
    fn destroying(&self) -> bool;
}

// ============================================================================
// RcBox - header and value in one allocation
// ============================================================================

/// A control block and its value, allocated together.
///
/// The header comes first so that a `NonNull<C>` to the block is also a
/// pointer to the whole allocation.
#[repr(C)]
pub(crate) struct RcBox<T, C> {
    block: C,
    value: MaybeUninit<T>,
}

impl<T, C: ControlBlock> RcBox<T, C> {
    /// Allocates a new box. The block starts in the constructing phase with
    /// zero counts.
    pub(crate) fn allocate(value: MaybeUninit<T>, lockable: bool) -> NonNull<C> {
        let boxed = Box::new(Self {
            block: C::with_hooks(Self::hooks(), lockable),
            value,
        });
        // SAFETY: `Box::into_raw` never returns null.
        unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) }.cast::<C>()
    }

    /// Pointer to the value slot of the box headed by `block`.
    ///
    /// # Safety
    ///
    /// `block` must have been returned by [`RcBox::allocate`] for this `T`
    /// and not yet freed.
    pub(crate) unsafe fn value_ptr(block: NonNull<C>) -> NonNull<T> {
        let raw = block.as_ptr().cast::<Self>();
        // SAFETY: `raw` is a live `RcBox<T, C>` per the caller's contract.
        unsafe { NonNull::new_unchecked(ptr::addr_of_mut!((*raw).value).cast::<T>()) }
    }

    /// Writes the value of a box allocated with an uninitialised slot.
    ///
    /// # Safety
    ///
    /// As for [`RcBox::value_ptr`]; the slot must not hold a value yet.
    pub(crate) unsafe fn write_value(block: NonNull<C>, value: T) -> NonNull<T> {
        // SAFETY: forwarded to the caller.
        unsafe {
            let slot = Self::value_ptr(block);
            slot.as_ptr().write(value);
            slot
        }
    }

    fn hooks() -> BlockHooks<C> {
        BlockHooks {
            drop_value: Self::drop_value,
            dealloc: Self::dealloc,
            type_name: std::any::type_name::<T>(),
        }
    }

    unsafe fn drop_value(data: *mut ()) {
        // SAFETY: `data` is the value slot recorded by `activate`.
        unsafe { ptr::drop_in_place(data.cast::<T>()) };
    }

    unsafe fn dealloc(block: NonNull<C>) {
        // SAFETY: the pointer came from `Box::into_raw` in `allocate`. The
        // value slot is `MaybeUninit`, so only the header is dropped here.
        drop(unsafe { Box::from_raw(block.as_ptr().cast::<Self>()) });
    }
}

/// Frees a block after one of its decrements reported that it must go.
///
/// # Safety
///
/// `block` must be live, both counts must be zero, and no reference to the
/// block may be used afterwards.
pub(crate) unsafe fn deallocate<C: ControlBlock>(block: NonNull<C>) {
    // SAFETY: the block is still allocated at this point.
    let hooks = unsafe { block.as_ref() }.hooks();

    #[cfg(feature = "tracing")]
    crate::tracing::internal::log_block_dealloc(hooks.type_name);

    // SAFETY: forwarded to the caller.
    unsafe { (hooks.dealloc)(block) };
}
