//! Drop probes shared by the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts how many values holding a clone of it were dropped, on one thread.
#[derive(Clone, Default)]
pub struct DropCounter(Rc<Cell<usize>>);

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> DropProbe {
        DropProbe(self.clone())
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

/// Bumps its counter when dropped.
pub struct DropProbe(DropCounter);

impl Drop for DropProbe {
    fn drop(&mut self) {
        let count = &(self.0).0;
        count.set(count.get() + 1);
    }
}

/// Thread-safe variant of [`DropCounter`].
#[derive(Clone, Default)]
pub struct SyncDropCounter(Arc<AtomicUsize>);

impl SyncDropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> SyncDropProbe {
        SyncDropProbe(self.clone())
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bumps its counter when dropped.
pub struct SyncDropProbe(SyncDropCounter);

impl Drop for SyncDropProbe {
    fn drop(&mut self) {
        (self.0).0.fetch_add(1, Ordering::SeqCst);
    }
}
