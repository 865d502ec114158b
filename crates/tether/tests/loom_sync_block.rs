//! Loom models of the thread-safe control block protocol.
//!
//! The models mirror `SyncBlock`: counts and the lifecycle phase change
//! together under one mutex, the deleter runs outside it, and the decision
//! to free the block is taken in the same critical section that ends the
//! destroying phase.

use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::sync::{Arc, Mutex};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
    Live,
    Destroying,
    Dead,
}

struct Counts {
    strong: usize,
    weak: usize,
    phase: Phase,
}

struct Block {
    counts: Mutex<Counts>,
    drops: AtomicUsize,
    frees: AtomicUsize,
}

impl Block {
    fn new(strong: usize, weak: usize) -> Self {
        Self {
            counts: Mutex::new(Counts {
                strong,
                weak,
                phase: Phase::Live,
            }),
            drops: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    fn increment_strong(&self) -> bool {
        let mut counts = self.counts.lock().unwrap();
        if counts.strong == 0 {
            return false;
        }
        counts.strong += 1;
        true
    }

    fn increment_weak(&self) -> bool {
        let mut counts = self.counts.lock().unwrap();
        if counts.phase == Phase::Dead {
            return false;
        }
        counts.weak += 1;
        true
    }

    fn decrement_strong(&self) {
        {
            let mut counts = self.counts.lock().unwrap();
            counts.strong -= 1;
            if counts.strong > 0 {
                return;
            }
            counts.phase = Phase::Destroying;
        }

        self.drops.fetch_add(1, Ordering::SeqCst);

        let free = {
            let mut counts = self.counts.lock().unwrap();
            counts.phase = Phase::Dead;
            counts.weak == 0
        };
        if free {
            self.frees.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn decrement_weak(&self) {
        let free = {
            let mut counts = self.counts.lock().unwrap();
            counts.weak -= 1;
            counts.weak == 0 && counts.strong == 0 && counts.phase == Phase::Dead
        };
        if free {
            self.frees.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// The last strong release and the last weak release race; the block is
/// freed exactly once whichever finishes first.
#[test]
#[ignore = "loom test - run with cargo test --test loom_sync_block --release -- --ignored"]
fn test_last_strong_and_last_weak_free_once() {
    loom::model(|| {
        let block = Arc::new(Block::new(1, 1));

        let strong_thread = loom::thread::spawn({
            let block = Arc::clone(&block);
            move || block.decrement_strong()
        });
        let weak_thread = loom::thread::spawn({
            let block = Arc::clone(&block);
            move || block.decrement_weak()
        });

        strong_thread.join().unwrap();
        weak_thread.join().unwrap();

        assert_eq!(block.drops.load(Ordering::SeqCst), 1);
        assert_eq!(block.frees.load(Ordering::SeqCst), 1);
    });
}

/// A weak lock racing the last strong release either wins (and then owns
/// the final release) or fails; the value is dropped exactly once.
#[test]
#[ignore = "loom test - run with cargo test --test loom_sync_block --release -- --ignored"]
fn test_lock_races_last_release() {
    loom::model(|| {
        let block = Arc::new(Block::new(1, 1));

        let release_thread = loom::thread::spawn({
            let block = Arc::clone(&block);
            move || block.decrement_strong()
        });
        let lock_thread = loom::thread::spawn({
            let block = Arc::clone(&block);
            move || {
                if block.increment_strong() {
                    assert_eq!(block.drops.load(Ordering::SeqCst), 0);
                    block.decrement_strong();
                }
                block.decrement_weak();
            }
        });

        release_thread.join().unwrap();
        lock_thread.join().unwrap();

        assert_eq!(block.drops.load(Ordering::SeqCst), 1);
        assert_eq!(block.frees.load(Ordering::SeqCst), 1);
    });
}

/// A weak reference cloned and dropped while the value is being destroyed
/// never frees the block underneath the deleter.
#[test]
#[ignore = "loom test - run with cargo test --test loom_sync_block --release -- --ignored"]
fn test_weak_clone_during_destroy_defers_free() {
    loom::model(|| {
        let block = Arc::new(Block::new(1, 1));

        let destroy_thread = loom::thread::spawn({
            let block = Arc::clone(&block);
            move || block.decrement_strong()
        });
        let observer_thread = loom::thread::spawn({
            let block = Arc::clone(&block);
            move || {
                if block.increment_weak() {
                    block.decrement_weak();
                }
                block.decrement_weak();
            }
        });

        destroy_thread.join().unwrap();
        observer_thread.join().unwrap();

        assert_eq!(block.drops.load(Ordering::SeqCst), 1);
        assert_eq!(block.frees.load(Ordering::SeqCst), 1);
    });
}
