//! Shared, weak and unique façades over a control block.
//!
//! Each façade holds at most one reference to a [`ControlBlock`] and is
//! generic over it: the aliases [`SharedPtr`], [`WeakPtr`] and [`UniquePtr`]
//! use the single-threaded [`LocalBlock`], while [`crate::atomic`] provides
//! the thread-safe counterparts over [`crate::block::SyncBlock`].
//!
//! None of the façades panic or return errors when reference counting fails.
//! A clone whose strong increment is refused comes out empty, and a weak
//! reference that cannot be locked yields `None`. Dereferencing an empty
//! [`Shared`] or [`Unique`] is the one panic.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use crate::block::{deallocate, ControlBlock, LocalBlock, RcBox};

/// A single-threaded shared pointer.
pub type SharedPtr<T> = Shared<T, LocalBlock>;

/// A single-threaded weak pointer.
pub type WeakPtr<T> = Weak<T, LocalBlock>;

/// A single-threaded exclusive pointer.
pub type UniquePtr<T> = Unique<T, LocalBlock>;

/// Allocates `value` together with its control block and returns the first
/// shared reference to it.
///
/// # Examples
///
/// ```
/// use tether::{make_shared, SharedPtr};
///
/// let a = make_shared(10);
/// let b = SharedPtr::clone(&a);
/// assert_eq!(*b, 10);
/// assert_eq!(SharedPtr::strong_count(&a), 2);
/// ```
#[must_use]
pub fn make_shared<T>(value: T) -> SharedPtr<T> {
    Shared::new(value)
}

/// Allocates `value` together with a non-lockable control block and returns
/// the only owning reference to it.
#[must_use]
pub fn make_unique<T>(value: T) -> UniquePtr<T> {
    Unique::new(value)
}

// ============================================================================
// Raw - block pointer plus typed value pointer
// ============================================================================

/// The pair every non-empty façade holds.
///
/// The typed pointer is kept next to the block so that casts and projections
/// can point into the value without a second allocation.
struct Raw<T, C> {
    block: NonNull<C>,
    ptr: NonNull<T>,
}

impl<T, C> Clone for Raw<T, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, C> Copy for Raw<T, C> {}

impl<T, C: ControlBlock> Raw<T, C> {
    /// Allocates a box holding `value` and moves it to the live phase.
    fn allocate(value: T, lockable: bool) -> Self {
        let block = RcBox::<T, C>::allocate(MaybeUninit::new(value), lockable);
        // SAFETY: the block was just allocated for `T` and is constructing.
        unsafe {
            let ptr = RcBox::<T, C>::value_ptr(block);
            block.as_ref().activate(ptr.cast());
            Self { block, ptr }
        }
    }

    /// Borrows the control block.
    ///
    /// # Safety
    ///
    /// The caller must hold a strong or weak reference for as long as the
    /// returned reference is used.
    unsafe fn block<'a>(self) -> &'a C {
        // SAFETY: forwarded to the caller.
        unsafe { self.block.as_ref() }
    }

    /// Re-types the value pointer, keeping the block.
    const fn cast<U>(self) -> Raw<U, C> {
        Raw {
            block: self.block,
            ptr: self.ptr.cast(),
        }
    }
}

/// Takes a new strong reference on `raw`'s block, under its reseat lock.
///
/// # Safety
///
/// The caller must hold a strong or weak reference to the block.
unsafe fn acquire_strong<T, C: ControlBlock>(raw: Raw<T, C>) -> Option<Raw<T, C>> {
    // SAFETY: forwarded to the caller.
    let block = unsafe { raw.block() };
    let _reseat = block.reseat_lock();
    block.increment_strong().then_some(raw)
}

/// Takes a new weak reference on `raw`'s block.
///
/// # Safety
///
/// The caller must hold a strong or weak reference to the block.
unsafe fn acquire_weak<T, C: ControlBlock>(raw: Raw<T, C>) -> Option<Raw<T, C>> {
    // SAFETY: forwarded to the caller.
    unsafe { raw.block() }.increment_weak().then_some(raw)
}

/// Gives up one strong reference, freeing the block if it was the last
/// reference of any kind.
///
/// # Safety
///
/// The caller must own the strong reference and not use `block` afterwards.
unsafe fn release_strong<C: ControlBlock>(block: NonNull<C>) {
    // No reseat lock here: the deleter may run user code that takes slot
    // mutexes, and slot holders take reseat locks.
    // SAFETY: our strong reference keeps the block allocated; forwarded to
    // the caller.
    if unsafe { block.as_ref().decrement_strong() } {
        // SAFETY: both counts reached zero.
        unsafe { deallocate(block) };
    }
}

/// Gives up one weak reference, freeing the block if it was the last
/// reference of any kind.
///
/// # Safety
///
/// The caller must own the weak reference and not use `block` afterwards.
unsafe fn release_weak<C: ControlBlock>(block: NonNull<C>) {
    // SAFETY: our weak reference keeps the block allocated.
    if unsafe { block.as_ref().decrement_weak() } {
        // SAFETY: both counts reached zero.
        unsafe { deallocate(block) };
    }
}

fn block_addr<T, C>(raw: Option<Raw<T, C>>) -> *const C {
    raw.map_or(ptr::null(), |raw| raw.block.as_ptr().cast_const())
}

// ============================================================================
// Shared<T, C> - shared ownership
// ============================================================================

/// A reference-counted owning pointer.
///
/// Clones share one control block; the value is dropped exactly once, when
/// the last strong reference goes away. A `Shared` may be empty (see
/// [`Shared::null`]); dereferencing an empty one panics, so check
/// [`Shared::is_valid`] or use [`Shared::try_get`] when emptiness is
/// possible.
///
/// Like `Rc`, the methods are associated functions (`Shared::downgrade(&p)`)
/// so they never shadow methods of `T`.
///
/// # Examples
///
/// ```
/// use tether::{make_shared, SharedPtr};
///
/// let shared = make_shared(10);
/// let weak = SharedPtr::downgrade(&shared);
/// assert_eq!(*weak.lock().unwrap(), 10);
/// assert!(!weak.expired());
///
/// let mut shared = shared;
/// SharedPtr::reset(&mut shared);
/// assert!(weak.expired());
/// assert!(weak.lock().is_none());
/// ```
pub struct Shared<T, C: ControlBlock = LocalBlock> {
    raw: Option<Raw<T, C>>,
    _owns: PhantomData<T>,
}

impl<T, C: ControlBlock> Shared<T, C> {
    /// Allocates `value` and its control block together.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::from_raw(Raw::allocate(value, true))
    }

    /// Builds a value that holds a weak reference to itself.
    ///
    /// `data_fn` receives a weak reference to the allocation being built.
    /// It may clone and store it, but locking it before `new_cyclic` returns
    /// fails. If `data_fn` panics the allocation is released and any weak
    /// clones it leaked stay expired.
    ///
    /// # Examples
    ///
    /// ```
    /// use tether::{SharedPtr, WeakPtr};
    ///
    /// struct Node {
    ///     me: WeakPtr<Node>,
    ///     value: i32,
    /// }
    ///
    /// let node = SharedPtr::new_cyclic(|me| {
    ///     assert!(me.lock().is_none());
    ///     Node { me: me.clone(), value: 7 }
    /// });
    /// assert_eq!(node.me.lock().unwrap().value, 7);
    /// ```
    #[must_use]
    pub fn new_cyclic<F>(data_fn: F) -> Self
    where
        F: FnOnce(&Weak<T, C>) -> T,
    {
        struct ConstructionGuard<T, C: ControlBlock> {
            weak: Weak<T, C>,
            completed: bool,
        }

        impl<T, C: ControlBlock> Drop for ConstructionGuard<T, C> {
            fn drop(&mut self) {
                if self.completed {
                    return;
                }
                if let Some(raw) = self.weak.raw {
                    // SAFETY: `weak` keeps the block allocated; the value was
                    // never written.
                    unsafe { raw.block().abandon() };
                }
            }
        }

        let block = RcBox::<T, C>::allocate(MaybeUninit::uninit(), true);
        // SAFETY: the block was just allocated for `T`.
        let raw = Raw {
            block,
            ptr: unsafe { RcBox::<T, C>::value_ptr(block) },
        };
        // SAFETY: the allocation above is owned by this function.
        let registered = unsafe { raw.block() }.increment_weak();
        debug_assert!(registered, "constructing block refused a weak reference");

        let mut guard = ConstructionGuard {
            weak: Weak::from_raw(raw),
            completed: false,
        };

        let value = data_fn(&guard.weak);

        // SAFETY: the slot is still empty and `guard.weak` keeps the block
        // allocated.
        unsafe {
            RcBox::<T, C>::write_value(block, value);
            raw.block().activate(raw.ptr.cast());
        }

        guard.completed = true;
        drop(guard);
        Self::from_raw(raw)
    }

    /// Returns an empty pointer that owns nothing.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            raw: None,
            _owns: PhantomData,
        }
    }

    const fn from_raw(raw: Raw<T, C>) -> Self {
        Self {
            raw: Some(raw),
            _owns: PhantomData,
        }
    }

    /// Returns `true` if this pointer references a block whose value is
    /// alive.
    #[must_use]
    pub fn is_valid(this: &Self) -> bool {
        // SAFETY: our strong reference keeps the block allocated.
        this.raw
            .is_some_and(|raw| !unsafe { raw.block() }.data().is_null())
    }

    /// Returns `true` if this pointer references no block at all.
    #[must_use]
    pub const fn is_null(this: &Self) -> bool {
        this.raw.is_none()
    }

    /// Returns the raw, non-owning pointer to the value, or null.
    #[must_use]
    pub fn as_ptr(this: &Self) -> *const T {
        match this.raw {
            Some(raw) if Self::is_valid(this) => raw.ptr.as_ptr().cast_const(),
            _ => ptr::null(),
        }
    }

    /// Returns a reference to the value, or `None` if this pointer is empty.
    #[must_use]
    pub fn try_get(this: &Self) -> Option<&T> {
        // SAFETY: our strong reference keeps the value alive.
        this.raw
            .filter(|_| Self::is_valid(this))
            .map(|raw| unsafe { raw.ptr.as_ref() })
    }

    /// Number of strong references to the value, or 0 if empty.
    #[must_use]
    pub fn strong_count(this: &Self) -> usize {
        // SAFETY: our strong reference keeps the block allocated.
        this.raw.map_or(0, |raw| unsafe { raw.block() }.strong())
    }

    /// Number of weak references to the value, or 0 if empty.
    #[must_use]
    pub fn weak_count(this: &Self) -> usize {
        // SAFETY: our strong reference keeps the block allocated.
        this.raw.map_or(0, |raw| unsafe { raw.block() }.weak())
    }

    /// Borrows the control block, for inspection.
    #[must_use]
    pub fn control_block(this: &Self) -> Option<&C> {
        // SAFETY: our strong reference keeps the block allocated.
        this.raw.map(|raw| unsafe { raw.block() })
    }

    /// Releases this pointer's strong reference, leaving it empty.
    pub fn reset(this: &mut Self) {
        if let Some(raw) = this.raw.take() {
            // SAFETY: the strong reference was ours and `raw` is forgotten.
            unsafe { release_strong(raw.block) };
        }
    }

    /// Creates a weak reference to the same value.
    ///
    /// Downgrading an empty pointer yields an empty weak reference.
    #[must_use]
    pub fn downgrade(this: &Self) -> Weak<T, C> {
        // SAFETY: our strong reference keeps the block allocated.
        let raw = this.raw.and_then(|raw| unsafe { acquire_weak(raw) });
        Weak { raw }
    }

    /// Returns `true` if both pointers reference the same control block.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        block_addr(this.raw) == block_addr(other.raw)
    }

    /// Creates a shared pointer of another type over the same control block,
    /// adding a strong reference.
    ///
    /// Returns `None` if this pointer is empty or the strong increment is
    /// refused.
    ///
    /// # Safety
    ///
    /// The value must be readable as a `U`: same size, compatible alignment
    /// and valid bit patterns. The value is still dropped as a `T`.
    #[must_use]
    pub unsafe fn reinterpret_pointer_cast<U>(this: &Self) -> Option<Shared<U, C>> {
        let raw = this.raw?.cast::<U>();
        // SAFETY: our strong reference keeps the block allocated.
        unsafe { acquire_strong(raw) }.map(Shared::from_raw)
    }

    /// Creates a shared pointer to a part of the value, sharing this
    /// pointer's control block.
    ///
    /// The result keeps the whole value alive. Projecting an empty pointer
    /// yields an empty pointer.
    ///
    /// # Examples
    ///
    /// ```
    /// use tether::{make_shared, SharedPtr};
    ///
    /// struct Config {
    ///     name: String,
    /// }
    ///
    /// let config = make_shared(Config { name: "main".into() });
    /// let name = SharedPtr::project(&config, |c| &c.name);
    /// drop(config);
    /// assert_eq!(*name, "main");
    /// ```
    #[must_use]
    pub fn project<U, F>(this: &Self, f: F) -> Shared<U, C>
    where
        F: for<'a> FnOnce(&'a T) -> &'a U,
    {
        let Some(raw) = this.raw.filter(|_| Self::is_valid(this)) else {
            return Shared::null();
        };
        // SAFETY: our strong reference keeps the value alive while `f` runs.
        let target = NonNull::from(f(unsafe { raw.ptr.as_ref() }));
        let projected = Raw {
            block: raw.block,
            ptr: target,
        };
        // SAFETY: our strong reference keeps the block allocated.
        unsafe { acquire_strong(projected) }.map_or_else(Shared::null, Shared::from_raw)
    }

    pub(crate) fn block_ptr(this: &Self) -> Option<NonNull<C>> {
        this.raw.map(|raw| raw.block)
    }
}

impl<T, C: ControlBlock> Clone for Shared<T, C> {
    fn clone(&self) -> Self {
        // SAFETY: our strong reference keeps the block allocated.
        self.raw
            .and_then(|raw| unsafe { acquire_strong(raw) })
            .map_or_else(Self::null, Self::from_raw)
    }
}

impl<T, C: ControlBlock> Drop for Shared<T, C> {
    fn drop(&mut self) {
        Self::reset(self);
    }
}

impl<T, C: ControlBlock> Deref for Shared<T, C> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the pointer is empty.
    fn deref(&self) -> &T {
        match self.raw {
            // SAFETY: our strong reference keeps the value alive.
            Some(raw) => unsafe { raw.ptr.as_ref() },
            None => panic!("dereferenced an empty shared pointer"),
        }
    }
}

impl<T, C: ControlBlock> Default for Shared<T, C> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T, C: ControlBlock> From<T> for Shared<T, C> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T, C: ControlBlock> PartialEq for Shared<T, C> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T, C: ControlBlock> Eq for Shared<T, C> {}

impl<T, C: ControlBlock> Hash for Shared<T, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        block_addr(self.raw).hash(state);
    }
}

impl<T: fmt::Debug, C: ControlBlock> fmt::Debug for Shared<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::try_get(self) {
            Some(value) => f.debug_tuple("Shared").field(value).finish(),
            None => write!(f, "Shared(<null>)"),
        }
    }
}

impl<T, C: ControlBlock> fmt::Pointer for Shared<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&Self::as_ptr(self), f)
    }
}

// ============================================================================
// Weak<T, C> - non-owning observation
// ============================================================================

/// A non-owning reference to a value held by [`Shared`] or [`Unique`].
///
/// A weak reference never keeps the value alive; it keeps only the control
/// block allocated. Use [`Weak::lock`] to obtain a [`Shared`] while the value
/// exists.
///
/// `Weak` deliberately does not implement `Deref`: a borrow taken through it
/// could outlive the last strong reference.
pub struct Weak<T, C: ControlBlock = LocalBlock> {
    raw: Option<Raw<T, C>>,
}

impl<T, C: ControlBlock> Weak<T, C> {
    /// Returns an empty weak reference that can never be locked.
    #[must_use]
    pub const fn new() -> Self {
        Self { raw: None }
    }

    const fn from_raw(raw: Raw<T, C>) -> Self {
        Self { raw: Some(raw) }
    }

    /// Attempts to obtain a strong reference.
    ///
    /// Fails if this reference is empty, if the block backs a [`Unique`], if
    /// the value is being destroyed (a destructor locking a weak reference
    /// to itself), or if the value is gone.
    #[must_use]
    pub fn lock(&self) -> Option<Shared<T, C>> {
        let raw = self.raw?;
        // SAFETY: our weak reference keeps the block allocated.
        let block = unsafe { raw.block() };
        let _reseat = block.reseat_lock();

        if !block.lockable() {
            #[cfg(feature = "tracing")]
            crate::tracing::internal::log_lock_denied("unlockable");
            return None;
        }
        if block.destroying() {
            #[cfg(feature = "tracing")]
            crate::tracing::internal::log_lock_denied("destroying");
            return None;
        }
        if block.data().is_null() || !block.increment_strong() {
            #[cfg(feature = "tracing")]
            crate::tracing::internal::log_lock_denied("expired");
            return None;
        }

        Some(Shared::from_raw(raw))
    }

    /// Returns `true` if the value cannot be observed any more.
    ///
    /// This is looser than `!is_valid()`: it is also `true` while the value
    /// is being destroyed, which lets a destructor tell "not gone yet" apart
    /// from "do not build a new owner".
    #[must_use]
    pub fn expired(&self) -> bool {
        let Some(raw) = self.raw else {
            return true;
        };
        // SAFETY: our weak reference keeps the block allocated.
        let block = unsafe { raw.block() };
        block.data().is_null() || block.destroying()
    }

    /// Returns `true` if the block exists and its value is alive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        // SAFETY: our weak reference keeps the block allocated.
        self.raw
            .is_some_and(|raw| !unsafe { raw.block() }.data().is_null())
    }

    /// Returns `true` if this reference has no block at all.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.raw.is_none()
    }

    /// Returns the raw, non-owning pointer to the value, or null if the
    /// value is gone.
    #[must_use]
    pub fn get(&self) -> *const T {
        match self.raw {
            Some(raw) if self.is_valid() => raw.ptr.as_ptr().cast_const(),
            _ => ptr::null(),
        }
    }

    /// Number of strong references to the value, or 0.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        // SAFETY: our weak reference keeps the block allocated.
        self.raw.map_or(0, |raw| unsafe { raw.block() }.strong())
    }

    /// Number of weak references to the value, or 0 if empty.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        // SAFETY: our weak reference keeps the block allocated.
        self.raw.map_or(0, |raw| unsafe { raw.block() }.weak())
    }

    /// Borrows the control block, for inspection.
    #[must_use]
    pub fn control_block(&self) -> Option<&C> {
        // SAFETY: our weak reference keeps the block allocated.
        self.raw.map(|raw| unsafe { raw.block() })
    }

    /// Releases this weak reference, leaving it empty.
    pub fn reset(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: the weak reference was ours and `raw` is forgotten.
            unsafe { release_weak(raw.block) };
        }
    }

    /// Returns `true` if both references point to the same control block.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        block_addr(self.raw) == block_addr(other.raw)
    }

    pub(crate) fn block_ptr(&self) -> Option<NonNull<C>> {
        self.raw.map(|raw| raw.block)
    }
}

impl<T, C: ControlBlock> Clone for Weak<T, C> {
    fn clone(&self) -> Self {
        // SAFETY: our weak reference keeps the block allocated.
        let raw = self.raw.and_then(|raw| unsafe { acquire_weak(raw) });
        Self { raw }
    }
}

impl<T, C: ControlBlock> Drop for Weak<T, C> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T, C: ControlBlock> Default for Weak<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: ControlBlock> From<&Shared<T, C>> for Weak<T, C> {
    fn from(shared: &Shared<T, C>) -> Self {
        Shared::downgrade(shared)
    }
}

impl<T, C: ControlBlock> From<&Unique<T, C>> for Weak<T, C> {
    fn from(unique: &Unique<T, C>) -> Self {
        Unique::downgrade(unique)
    }
}

impl<T, C: ControlBlock> PartialEq for Weak<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T, C: ControlBlock> Eq for Weak<T, C> {}

impl<T, C: ControlBlock> Hash for Weak<T, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        block_addr(self.raw).hash(state);
    }
}

impl<T, C: ControlBlock> fmt::Debug for Weak<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Weak)")
    }
}

// ============================================================================
// Unique<T, C> - exclusive ownership
// ============================================================================

/// An exclusive owning pointer.
///
/// `Unique` is movable but not clonable. Its control block is created
/// non-lockable, so weak references taken from it (for observation) never
/// lock into a second owner.
///
/// # Examples
///
/// ```
/// use tether::{make_unique, UniquePtr};
///
/// let mut unique = make_unique(vec![1, 2]);
/// unique.push(3);
///
/// let weak = UniquePtr::downgrade(&unique);
/// assert!(weak.is_valid());
/// assert!(weak.lock().is_none());
///
/// drop(unique);
/// assert!(weak.expired());
/// ```
pub struct Unique<T, C: ControlBlock = LocalBlock> {
    raw: Option<Raw<T, C>>,
    _owns: PhantomData<T>,
}

impl<T, C: ControlBlock> Unique<T, C> {
    /// Allocates `value` and its non-lockable control block together.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            raw: Some(Raw::allocate(value, false)),
            _owns: PhantomData,
        }
    }

    /// Returns an empty pointer that owns nothing.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            raw: None,
            _owns: PhantomData,
        }
    }

    /// Returns `true` if this pointer owns a live value.
    #[must_use]
    pub fn is_valid(this: &Self) -> bool {
        // SAFETY: our strong reference keeps the block allocated.
        this.raw
            .is_some_and(|raw| !unsafe { raw.block() }.data().is_null())
    }

    /// Returns `true` if this pointer owns nothing.
    #[must_use]
    pub const fn is_null(this: &Self) -> bool {
        this.raw.is_none()
    }

    /// Returns the raw, non-owning pointer to the value, or null.
    #[must_use]
    pub fn as_ptr(this: &Self) -> *const T {
        match this.raw {
            Some(raw) if Self::is_valid(this) => raw.ptr.as_ptr().cast_const(),
            _ => ptr::null(),
        }
    }

    /// Returns a reference to the value, or `None` if this pointer is empty.
    #[must_use]
    pub fn try_get(this: &Self) -> Option<&T> {
        // SAFETY: we are the only owner and the value is alive.
        this.raw
            .filter(|_| Self::is_valid(this))
            .map(|raw| unsafe { raw.ptr.as_ref() })
    }

    /// Returns a mutable reference to the value, or `None` if this pointer
    /// is empty.
    #[must_use]
    pub fn try_get_mut(this: &mut Self) -> Option<&mut T> {
        // SAFETY: we are the only owner and no `Shared` can exist for a
        // non-lockable block.
        this.raw
            .filter(|_| Self::is_valid(this))
            .map(|mut raw| unsafe { raw.ptr.as_mut() })
    }

    /// Number of weak references observing the value, or 0 if empty.
    #[must_use]
    pub fn weak_count(this: &Self) -> usize {
        // SAFETY: our strong reference keeps the block allocated.
        this.raw.map_or(0, |raw| unsafe { raw.block() }.weak())
    }

    /// Borrows the control block, for inspection.
    #[must_use]
    pub fn control_block(this: &Self) -> Option<&C> {
        // SAFETY: our strong reference keeps the block allocated.
        this.raw.map(|raw| unsafe { raw.block() })
    }

    /// Drops the value now, leaving this pointer empty.
    pub fn reset(this: &mut Self) {
        if let Some(raw) = this.raw.take() {
            // SAFETY: the only strong reference was ours.
            unsafe { release_strong(raw.block) };
        }
    }

    /// Creates a weak reference for observation. It never locks.
    #[must_use]
    pub fn downgrade(this: &Self) -> Weak<T, C> {
        // SAFETY: our strong reference keeps the block allocated.
        let raw = this.raw.and_then(|raw| unsafe { acquire_weak(raw) });
        Weak { raw }
    }
}

impl<T, C: ControlBlock> Drop for Unique<T, C> {
    fn drop(&mut self) {
        Self::reset(self);
    }
}

impl<T, C: ControlBlock> Deref for Unique<T, C> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the pointer is empty.
    fn deref(&self) -> &T {
        match self.raw {
            // SAFETY: we own the value and it is alive.
            Some(raw) => unsafe { raw.ptr.as_ref() },
            None => panic!("dereferenced an empty unique pointer"),
        }
    }
}

impl<T, C: ControlBlock> DerefMut for Unique<T, C> {
    /// # Panics
    ///
    /// Panics if the pointer is empty.
    fn deref_mut(&mut self) -> &mut T {
        match self.raw {
            // SAFETY: we are the only owner; `&mut self` excludes other
            // borrows through this pointer.
            Some(mut raw) => unsafe { raw.ptr.as_mut() },
            None => panic!("dereferenced an empty unique pointer"),
        }
    }
}

impl<T, C: ControlBlock> Default for Unique<T, C> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T, C: ControlBlock> From<T> for Unique<T, C> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug, C: ControlBlock> fmt::Debug for Unique<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::try_get(self) {
            Some(value) => f.debug_tuple("Unique").field(value).finish(),
            None => write!(f, "Unique(<null>)"),
        }
    }
}

impl<T, C: ControlBlock> fmt::Pointer for Unique<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&Self::as_ptr(self), f)
    }
}
