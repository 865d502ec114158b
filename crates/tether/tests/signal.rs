//! Tests for signals and listener handles.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tether::{make_shared, ListenerHandle, SharedPtr, Signal, SignalBase};

fn counter_listener(signal: &Signal, count: &Rc<Cell<u32>>) -> ListenerHandle {
    let count = Rc::clone(count);
    signal.register_listener(move |()| count.set(count.get() + 1))
}

// ============================================================================
// Dynamic listeners
// ============================================================================

#[test]
fn test_listener_detaches_when_handle_dropped() {
    let signal: Signal = Signal::new();
    let count = Rc::new(Cell::new(0));

    let handle = counter_listener(&signal, &count);
    signal.emit(&());
    signal.emit(&());
    signal.emit(&());
    assert_eq!(count.get(), 3);

    drop(handle);
    signal.emit(&());
    assert_eq!(count.get(), 3);
}

#[test]
fn test_listener_detaches_on_reset() {
    let signal: Signal = Signal::new();
    let count = Rc::new(Cell::new(0));

    let mut handle = counter_listener(&signal, &count);
    signal.emit(&());
    SharedPtr::reset(&mut handle);
    signal.emit(&());
    assert_eq!(count.get(), 1);
    assert_eq!(signal.listener_count(), 0);
}

#[test]
fn test_cloned_handle_keeps_listener() {
    let signal: Signal = Signal::new();
    let count = Rc::new(Cell::new(0));

    let handle = counter_listener(&signal, &count);
    let copy = ListenerHandle::clone(&handle);
    drop(handle);
    signal.emit(&());
    assert_eq!(count.get(), 1);

    drop(copy);
    signal.emit(&());
    assert_eq!(count.get(), 1);
}

#[test]
fn test_listeners_called_in_registration_order() {
    let signal: Signal<&'static str> = Signal::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let handles: Vec<_> = ["first", "second", "third"]
        .into_iter()
        .map(|name| {
            let order = Rc::clone(&order);
            signal.register_listener(move |event| {
                order.borrow_mut().push(format!("{name}:{event}"));
            })
        })
        .collect();

    signal.emit(&"go");
    assert_eq!(*order.borrow(), ["first:go", "second:go", "third:go"]);
    drop(handles);
}

#[test]
fn test_tuple_payload() {
    let signal: Signal<(u32, String)> = Signal::new();
    let seen = Rc::new(RefCell::new(None));

    let _handle = signal.register_listener({
        let seen = Rc::clone(&seen);
        move |(id, name): &(u32, String)| *seen.borrow_mut() = Some(format!("{id}={name}"))
    });

    signal.emit(&(7, String::from("seven")));
    assert_eq!(seen.borrow().as_deref(), Some("7=seven"));
}

#[test]
fn test_emit_without_listeners() {
    let signal: Signal<u8> = Signal::default();
    signal.emit(&1);
    assert_eq!(signal.listener_count(), 0);
}

// ============================================================================
// Static listeners
// ============================================================================

#[test]
fn test_static_listener_lives_with_signal() {
    let count = Rc::new(Cell::new(0));
    {
        let signal: Signal = Signal::new();
        let inner = Rc::clone(&count);
        signal.register_static_listener(move |()| inner.set(inner.get() + 1));
        signal.emit(&());
        signal.emit(&());
        assert_eq!(signal.listener_count(), 1);
    }
    assert_eq!(count.get(), 2);
    assert_eq!(Rc::strong_count(&count), 1);
}

#[test]
fn test_static_listeners_run_after_dynamic() {
    let signal: Signal = Signal::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    signal.register_static_listener({
        let order = Rc::clone(&order);
        move |()| order.borrow_mut().push("static")
    });
    let _handle = signal.register_listener({
        let order = Rc::clone(&order);
        move |()| order.borrow_mut().push("dynamic")
    });

    signal.emit(&());
    assert_eq!(*order.borrow(), ["dynamic", "static"]);
}

#[test]
fn test_bound_static_listener_follows_owner() {
    struct Label {
        text: RefCell<String>,
    }

    let signal: Signal<String> = Signal::new();
    let label = make_shared(Label {
        text: RefCell::new(String::new()),
    });

    signal.register_static_listener_bound(SharedPtr::downgrade(&label), |label: &Label, text| {
        label.text.borrow_mut().clone_from(text);
    });

    signal.emit(&String::from("hello"));
    assert_eq!(*label.text.borrow(), "hello");

    let weak = SharedPtr::downgrade(&label);
    drop(label);
    // The owner is gone; the bound listener is skipped.
    signal.emit(&String::from("ignored"));
    assert!(weak.expired());
    assert_eq!(signal.listener_count(), 1);
}

// ============================================================================
// Untyped dispatch
// ============================================================================

#[test]
fn test_signal_base_with_any_payload() {
    let base = SignalBase::new();
    let total = Rc::new(Cell::new(0_i32));

    let handle = base.register_listener({
        let total = Rc::clone(&total);
        move |payload| {
            if let Some(n) = payload.downcast_ref::<i32>() {
                total.set(total.get() + n);
            } else if let Some(s) = payload.downcast_ref::<&str>() {
                total.set(total.get() + i32::try_from(s.len()).unwrap_or(0));
            }
        }
    });

    base.emit(&5_i32);
    base.emit(&"abc");
    assert_eq!(total.get(), 8);
    assert_eq!(base.listener_count(), 1);
    drop(handle);
    assert_eq!(base.listener_count(), 0);
}

#[test]
fn test_typed_signal_exposes_base() {
    let signal: Signal<u64> = Signal::new();
    let seen = Rc::new(Cell::new(0));
    let _handle = signal.register_listener({
        let seen = Rc::clone(&seen);
        move |n| seen.set(*n)
    });

    signal.as_base().emit(&99_u64);
    assert_eq!(seen.get(), 99);
}
