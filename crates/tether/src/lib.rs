//! Reference-counted smart pointers with custom control blocks, and the
//! signal/listener system built on them.
//!
//! `tether` provides three owning façades over one control block design:
//!
//! - [`SharedPtr<T>`]: shared ownership, like `Rc<T>`.
//! - [`WeakPtr<T>`]: non-owning observation, lockable into a `SharedPtr`.
//! - [`UniquePtr<T>`]: exclusive ownership; weak references to it observe
//!   but never lock.
//!
//! Thread-safe counterparts live in [`atomic`], and [`signal`] offers an
//! event emitter whose dynamically registered listeners detach when their
//! handle is dropped.
//!
//! # Features
//!
//! - **Combined allocation**: the control block and the value share one
//!   heap allocation.
//! - **Safe self-referential teardown**: a value may hold, clone and drop
//!   weak references to itself from inside its own destructor.
//! - **Nullable façades**: refused reference acquisition yields an empty
//!   pointer or `None` instead of an error.
//!
//! # Quick Start
//!
//! ```
//! use tether::{make_shared, SharedPtr};
//!
//! let shared = make_shared(10);
//! let weak = SharedPtr::downgrade(&shared);
//! assert_eq!(*weak.lock().unwrap(), 10);
//!
//! drop(shared);
//! assert!(weak.expired());
//! assert!(weak.lock().is_none());
//! ```
//!
//! # Signals
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use tether::Signal;
//!
//! let clicked: Signal<u32> = Signal::new();
//! let total = Rc::new(Cell::new(0_u32));
//!
//! let handle = clicked.register_listener({
//!     let total = Rc::clone(&total);
//!     move |n| total.set(total.get() + n)
//! });
//! clicked.emit(&2);
//! drop(handle);
//! clicked.emit(&2);
//! assert_eq!(total.get(), 2);
//! ```
//!
//! # Thread Safety
//!
//! [`SharedPtr`], [`WeakPtr`], [`UniquePtr`] and [`Signal`] are `!Send` and
//! `!Sync`. Use [`AtomicSharedPtr`] and [`AtomicWeakPtr`] to share values
//! between threads.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod atomic;
pub mod block;
mod ptr;
pub mod signal;
mod tracing;

// Re-export public API
pub use atomic::{
    make_atomic_shared, AtomicSharedCell, AtomicSharedPtr, AtomicUniquePtr, AtomicWeakCell,
    AtomicWeakPtr,
};
pub use block::{ControlBlock, LocalBlock, SyncBlock};
pub use ptr::{make_shared, make_unique, Shared, SharedPtr, Unique, UniquePtr, Weak, WeakPtr};
pub use signal::{Listener, ListenerHandle, Signal, SignalBase};
