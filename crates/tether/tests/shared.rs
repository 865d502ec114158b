//! Tests for shared ownership through `SharedPtr<T>`.

mod common;

use std::collections::HashMap;

use common::DropCounter;
use tether::{make_shared, ControlBlock, SharedPtr};

// ============================================================================
// Construction and access
// ============================================================================

#[test]
fn test_make_shared_basic() {
    let shared = make_shared(10);
    assert!(SharedPtr::is_valid(&shared));
    assert!(!SharedPtr::is_null(&shared));
    assert_eq!(*shared, 10);
    assert_eq!(SharedPtr::strong_count(&shared), 1);
    assert_eq!(SharedPtr::weak_count(&shared), 0);
}

#[test]
fn test_default_is_empty() {
    let shared: SharedPtr<String> = SharedPtr::default();
    assert!(SharedPtr::is_null(&shared));
    assert!(!SharedPtr::is_valid(&shared));
    assert_eq!(SharedPtr::strong_count(&shared), 0);
    assert!(SharedPtr::control_block(&shared).is_none());
    assert_eq!(format!("{shared:?}"), "Shared(<null>)");
}

#[test]
fn test_from_value() {
    let shared: SharedPtr<Vec<u8>> = vec![1, 2, 3].into();
    assert_eq!(shared.len(), 3);
    assert_eq!(format!("{shared:?}"), "Shared([1, 2, 3])");
}

#[test]
fn test_try_get_and_as_ptr() {
    let shared = make_shared(String::from("value"));
    assert_eq!(SharedPtr::try_get(&shared).map(String::as_str), Some("value"));
    assert_eq!(SharedPtr::as_ptr(&shared), std::ptr::from_ref(&*shared));
}

// ============================================================================
// Copy, move and reset
// ============================================================================

#[test]
fn test_clone_shares_block() {
    let a = make_shared(1);
    let b = SharedPtr::clone(&a);
    assert!(SharedPtr::ptr_eq(&a, &b));
    assert_eq!(SharedPtr::strong_count(&a), 2);
    assert_eq!(SharedPtr::as_ptr(&a), SharedPtr::as_ptr(&b));
}

#[test]
fn test_move_transfers_reference() {
    let counter = DropCounter::new();
    let a = make_shared(counter.probe());
    let b = a;
    assert_eq!(SharedPtr::strong_count(&b), 1);
    drop(b);
    assert_eq!(counter.get(), 1);
}

#[test]
fn test_value_dropped_once_by_last_owner() {
    let counter = DropCounter::new();
    let owners: Vec<_> = {
        let first = make_shared(counter.probe());
        (0..10).map(|_| SharedPtr::clone(&first)).collect()
    };

    assert_eq!(counter.get(), 0);
    assert_eq!(SharedPtr::strong_count(&owners[0]), 10);
    drop(owners);
    assert_eq!(counter.get(), 1);
}

#[test]
fn test_reset_releases_only_this_reference() {
    let counter = DropCounter::new();
    let mut a = make_shared(counter.probe());
    let b = SharedPtr::clone(&a);

    SharedPtr::reset(&mut a);
    assert!(SharedPtr::is_null(&a));
    assert_eq!(SharedPtr::strong_count(&b), 1);
    assert_eq!(counter.get(), 0);

    drop(b);
    assert_eq!(counter.get(), 1);
}

#[test]
fn test_reassignment_releases_previous_value() {
    let counter = DropCounter::new();
    let mut slot = make_shared(counter.probe());
    assert!(SharedPtr::is_valid(&slot));
    slot = make_shared(counter.probe());
    assert_eq!(counter.get(), 1);
    drop(slot);
    assert_eq!(counter.get(), 2);
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_equality_is_identity() {
    let a = make_shared(5);
    let b = make_shared(5);
    assert_eq!(a, SharedPtr::clone(&a));
    assert_ne!(a, b);
    assert_eq!(SharedPtr::<i32>::null(), SharedPtr::null());
}

#[test]
fn test_shared_as_map_key() {
    let a = make_shared("a");
    let b = make_shared("b");
    let mut names = HashMap::new();
    names.insert(SharedPtr::clone(&a), 1);
    names.insert(SharedPtr::clone(&b), 2);
    names.insert(SharedPtr::clone(&a), 3);

    assert_eq!(names.len(), 2);
    assert_eq!(names[&a], 3);
    assert_eq!(names[&b], 2);
}

// ============================================================================
// Control block inspection
// ============================================================================

#[test]
fn test_control_block_reports_counts() {
    let shared = make_shared(0_u64);
    let weak = SharedPtr::downgrade(&shared);
    let copy = SharedPtr::clone(&shared);

    let block = SharedPtr::control_block(&shared).unwrap();
    assert_eq!(block.strong(), 2);
    assert_eq!(block.weak(), 1);
    assert!(block.lockable());
    assert!(!block.destroying());
    assert!(!block.data().is_null());

    drop(copy);
    drop(weak);
    assert_eq!(SharedPtr::control_block(&shared).unwrap().strong(), 1);
}

#[test]
fn test_zero_sized_value() {
    struct Marker;

    let counter = DropCounter::new();
    let a = make_shared(Marker);
    let b = make_shared(Marker);
    assert!(!SharedPtr::ptr_eq(&a, &b));

    let probe = make_shared(counter.probe());
    drop(probe);
    assert_eq!(counter.get(), 1);
}
