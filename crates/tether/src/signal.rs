//! Type-erased signals and listeners.
//!
//! A [`Signal`] holds weak references to dynamically registered listeners
//! and strong references to static ones. Registering a dynamic listener
//! returns a [`ListenerHandle`]; the signal only observes it, so dropping
//! every clone of the handle detaches the listener without an explicit
//! unregister call.
//!
//! Emission works on a snapshot taken when `emit` starts, so handlers may
//! register listeners or drop handles (their own or others') while the
//! signal is dispatching:
//!
//! - listeners registered during an emission are not called in that pass;
//! - a listener whose last handle is dropped before its turn is skipped.
//!
//! Signals are single-threaded. A panic in a handler propagates out of
//! [`Signal::emit`]; the signal stays usable afterwards.
//!
//! # Examples
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use tether::Signal;
//!
//! let resized: Signal<(u32, u32)> = Signal::new();
//! let area = Rc::new(Cell::new(0));
//!
//! let handle = resized.register_listener({
//!     let area = Rc::clone(&area);
//!     move |&(w, h)| area.set(w * h)
//! });
//!
//! resized.emit(&(4, 5));
//! assert_eq!(area.get(), 20);
//!
//! drop(handle);
//! resized.emit(&(10, 10));
//! assert_eq!(area.get(), 20);
//! ```

use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;

use crate::ptr::{make_shared, SharedPtr, WeakPtr};

/// A type-erased event handler attached to a signal.
pub struct Listener {
    handler: Box<dyn Fn(&dyn Any)>,
    /// Strong references held by emission snapshots, across nested emits.
    in_flight: Cell<usize>,
}

impl Listener {
    fn new(handler: impl Fn(&dyn Any) + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            in_flight: Cell::new(0),
        }
    }

    /// Calls the handler with an erased payload.
    pub fn emit(&self, payload: &dyn Any) {
        (self.handler)(payload);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").finish_non_exhaustive()
    }
}

/// A dynamic listener resolved for one emission. Counts itself in the
/// listener's `in_flight` so detachment stays visible however deeply emits
/// nest.
struct InFlight(ListenerHandle);

impl InFlight {
    fn new(handle: ListenerHandle) -> Self {
        handle.in_flight.set(handle.in_flight.get() + 1);
        Self(handle)
    }

    /// `true` once every remaining strong reference belongs to a snapshot.
    fn detached(&self) -> bool {
        SharedPtr::strong_count(&self.0) <= self.0.in_flight.get()
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.set(self.0.in_flight.get() - 1);
    }
}

/// Keeps a dynamically registered listener attached.
///
/// Dropping every clone of the handle, or resetting it with
/// [`SharedPtr::reset`], detaches the listener.
pub type ListenerHandle = SharedPtr<Listener>;

// ============================================================================
// SignalBase - the untyped dispatcher
// ============================================================================

/// The untyped core of a [`Signal`].
///
/// Payloads travel as `&dyn Any`. Emitter and listeners agree on the
/// concrete payload type out of band; [`Signal`] enforces that agreement at
/// compile time.
#[derive(Default)]
pub struct SignalBase {
    listeners: RefCell<Vec<WeakPtr<Listener>>>,
    statics: RefCell<Vec<SharedPtr<Listener>>>,
}

impl SignalBase {
    /// Creates a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener that stays attached while the returned handle
    /// (or a clone of it) is alive.
    #[must_use = "dropping the handle detaches the listener immediately"]
    pub fn register_listener(&self, handler: impl Fn(&dyn Any) + 'static) -> ListenerHandle {
        let handle = make_shared(Listener::new(handler));

        let mut listeners = self.listeners.borrow_mut();
        Self::prune(&mut listeners);
        listeners.push(SharedPtr::downgrade(&handle));

        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_listener_registered(listeners.len(), false);

        handle
    }

    /// Registers a listener owned by the signal itself. It stays attached
    /// until the signal is dropped.
    pub fn register_static_listener(&self, handler: impl Fn(&dyn Any) + 'static) {
        let mut statics = self.statics.borrow_mut();
        statics.push(make_shared(Listener::new(handler)));

        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_listener_registered(statics.len(), true);
    }

    /// Calls every attached listener with `payload`.
    ///
    /// Dynamic listeners run first, then static ones, each group in
    /// registration order.
    pub fn emit(&self, payload: &dyn Any) {
        let (listeners, statics) = self.snapshot();

        #[cfg(feature = "tracing")]
        let _span = crate::tracing::internal::trace_emit(listeners.len(), statics.len());

        for listener in &listeners {
            if listener.detached() {
                #[cfg(feature = "tracing")]
                crate::tracing::internal::log_listener_skipped();
                continue;
            }
            listener.0.emit(payload);
        }

        for listener in &statics {
            listener.emit(payload);
        }
    }

    /// Number of attached listeners, static ones included.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.borrow_mut();
        Self::prune(&mut listeners);
        listeners.len() + self.statics.borrow().len()
    }

    /// Resolves the live listeners. No `RefCell` borrow outlives this call,
    /// so handlers are free to register and drop listeners.
    fn snapshot(&self) -> (Vec<InFlight>, Vec<ListenerHandle>) {
        let mut listeners = self.listeners.borrow_mut();
        Self::prune(&mut listeners);
        let resolved = listeners
            .iter()
            .filter_map(WeakPtr::lock)
            .map(InFlight::new)
            .collect();
        let statics = self.statics.borrow().clone();
        (resolved, statics)
    }

    fn prune(listeners: &mut Vec<WeakPtr<Listener>>) {
        #[cfg(feature = "tracing")]
        let before = listeners.len();

        listeners.retain(|listener| !listener.expired());

        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_listeners_pruned(before - listeners.len(), listeners.len());
    }
}

impl fmt::Debug for SignalBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBase")
            .field("listeners", &self.listeners.borrow().len())
            .field("statics", &self.statics.borrow().len())
            .finish()
    }
}

// ============================================================================
// Signal<A> - the typed façade
// ============================================================================

/// An event emitter whose payload type is `A`.
///
/// Multi-argument events use a tuple payload: `Signal<(u32, String)>`.
/// Handlers receive the payload by reference.
pub struct Signal<A: 'static = ()> {
    base: SignalBase,
    _payload: PhantomData<fn(&A)>,
}

impl<A: 'static> Signal<A> {
    /// Creates a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: SignalBase::new(),
            _payload: PhantomData,
        }
    }

    /// Registers a listener that stays attached while the returned handle
    /// (or a clone of it) is alive.
    #[must_use = "dropping the handle detaches the listener immediately"]
    pub fn register_listener<F>(&self, handler: F) -> ListenerHandle
    where
        F: Fn(&A) + 'static,
    {
        self.base
            .register_listener(move |payload| handler(downcast_payload(payload)))
    }

    /// Registers a listener owned by the signal. It stays attached until the
    /// signal is dropped.
    pub fn register_static_listener<F>(&self, handler: F)
    where
        F: Fn(&A) + 'static,
    {
        self.base
            .register_static_listener(move |payload| handler(downcast_payload(payload)));
    }

    /// Registers a static listener bound to `owner`.
    ///
    /// The handler receives the owner alongside the payload, and is skipped
    /// once the owner can no longer be locked (dropped, being destroyed, or
    /// held by a `UniquePtr`).
    pub fn register_static_listener_bound<O, F>(&self, owner: WeakPtr<O>, handler: F)
    where
        O: 'static,
        F: Fn(&O, &A) + 'static,
    {
        self.base.register_static_listener(move |payload| {
            if let Some(owner) = owner.lock() {
                handler(&*owner, downcast_payload(payload));
            }
        });
    }

    /// Calls every attached listener with `args`.
    pub fn emit(&self, args: &A) {
        self.base.emit(args);
    }

    /// Number of attached listeners, static ones included.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.base.listener_count()
    }

    /// Borrows the untyped dispatcher.
    #[must_use]
    pub const fn as_base(&self) -> &SignalBase {
        &self.base
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("payload", &type_name::<A>())
            .field("base", &self.base)
            .finish()
    }
}

/// Recovers a typed payload.
///
/// # Panics
///
/// Panics if a payload of another type was emitted through
/// [`Signal::as_base`].
fn downcast_payload<A: 'static>(payload: &dyn Any) -> &A {
    match payload.downcast_ref::<A>() {
        Some(args) => args,
        None => panic!(
            "signal payload type mismatch: listener expects {}",
            type_name::<A>()
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_registration_prunes_dead_entries() {
        let signal: Signal<()> = Signal::new();

        let first = signal.register_listener(|()| {});
        let second = signal.register_listener(|()| {});
        assert_eq!(signal.base.listeners.borrow().len(), 2);

        drop(first);
        drop(second);
        let third = signal.register_listener(|()| {});
        assert_eq!(signal.base.listeners.borrow().len(), 1);
        assert_eq!(signal.listener_count(), 1);
        drop(third);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn test_erased_base_dispatches_any_payload() {
        let base = SignalBase::new();
        let seen = Rc::new(Cell::new(0_i64));

        let handle = base.register_listener({
            let seen = Rc::clone(&seen);
            move |payload| {
                if let Some(value) = payload.downcast_ref::<i64>() {
                    seen.set(*value);
                }
            }
        });

        base.emit(&42_i64);
        base.emit(&"ignored");
        assert_eq!(seen.get(), 42);
        drop(handle);
    }

    #[test]
    #[should_panic(expected = "payload type mismatch")]
    fn test_mismatched_payload_panics() {
        let signal: Signal<u8> = Signal::new();
        signal.register_static_listener(|_| {});
        signal.as_base().emit(&"not a u8");
    }
}
