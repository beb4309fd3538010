//! Batching, queue behavior, and failure isolation.

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use flare_signals::Runtime;

#[test]
fn batch_coalesces_writes_into_one_run() {
    let mut rt = Runtime::new();
    let observed: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));

    let a = rt.create_signal(0);
    {
        let observed = observed.clone();
        rt.create_effect(move |rt| {
            let value = rt.get(a);
            observed.borrow_mut().push(value);
        });
    }
    assert_eq!(*observed.borrow(), vec![0]);

    rt.batch(|rt| {
        rt.set(a, 1);
        rt.set(a, 2);
    });

    // one run after the batch, observing the final value
    assert_eq!(*observed.borrow(), vec![0, 2]);
}

#[test]
fn reads_inside_a_batch_observe_the_latest_write() {
    let mut rt = Runtime::new();
    let a = rt.create_signal(1);

    rt.batch(|rt| {
        rt.set(a, 10);
        assert_eq!(rt.get(a), 10);
        rt.set(a, 20);
        assert_eq!(rt.get(a), 20);
    });
    assert_eq!(rt.get(a), 20);
}

#[test]
fn only_the_outermost_batch_flushes() {
    let mut rt = Runtime::new();
    let runs = Rc::new(Cell::new(0u32));

    let a = rt.create_signal(0);
    {
        let runs = runs.clone();
        rt.create_effect(move |rt| {
            let _ = rt.get(a);
            runs.set(runs.get() + 1);
        });
    }
    assert_eq!(runs.get(), 1);

    rt.batch(|rt| {
        rt.set(a, 1);
        rt.batch(|rt| {
            rt.set(a, 2);
            rt.set(a, 3);
        });
        // inner batch closed, outer still open: nothing ran yet
        assert_eq!(runs.get(), 1);
        rt.set(a, 4);
    });
    assert_eq!(runs.get(), 2);
    assert_eq!(rt.get(a), 4);
}

#[test]
fn batch_returns_the_closure_value() {
    let mut rt = Runtime::new();
    let a = rt.create_signal(2);
    let result = rt.batch(|rt| rt.get(a) * 21);
    assert_eq!(result, 42);
}

#[test]
fn a_batch_that_panics_still_closes_and_flushes() {
    let mut rt = Runtime::new();
    let runs = Rc::new(Cell::new(0u32));

    let a = rt.create_signal(0);
    {
        let runs = runs.clone();
        rt.create_effect(move |rt| {
            let _ = rt.get(a);
            runs.set(runs.get() + 1);
        });
    }
    assert_eq!(runs.get(), 1);

    let result = catch_unwind(AssertUnwindSafe(|| {
        rt.batch(|rt| {
            rt.set(a, 42);
            panic!("mid-batch failure");
        });
    }));
    assert!(result.is_err());

    // the batch unwound cleanly: depth reset and the queued effect ran
    assert!(!rt.is_batching());
    assert_eq!(runs.get(), 2);
    assert_eq!(rt.get(a), 42);
}

#[test]
fn a_panicking_effect_does_not_starve_queued_siblings() {
    let mut rt = Runtime::new();
    let healthy_runs = Rc::new(Cell::new(0u32));

    let a = rt.create_signal(0);
    rt.create_effect(move |rt| {
        if rt.get(a) > 0 {
            panic!("effect body failure");
        }
    });
    {
        let healthy_runs = healthy_runs.clone();
        rt.create_effect(move |rt| {
            let _ = rt.get(a);
            healthy_runs.set(healthy_runs.get() + 1);
        });
    }
    assert_eq!(healthy_runs.get(), 1);

    // the first effect panics; the write site sees the panic, but the
    // second effect queued in the same flush still ran
    let result = catch_unwind(AssertUnwindSafe(|| rt.set(a, 1)));
    assert!(result.is_err());
    assert_eq!(healthy_runs.get(), 2);

    // the engine is still usable afterwards
    let result = catch_unwind(AssertUnwindSafe(|| rt.set(a, 2)));
    assert!(result.is_err());
    assert_eq!(healthy_runs.get(), 3);
}

#[test]
fn computed_panic_propagates_and_the_next_read_retries() {
    let mut rt = Runtime::new();
    let should_fail = Rc::new(Cell::new(true));

    let a = rt.create_signal(1);
    let c = {
        let should_fail = should_fail.clone();
        rt.create_computed(move |rt| {
            if should_fail.get() {
                panic!("getter failure");
            }
            rt.get(a) * 2
        })
    };

    let result = catch_unwind(AssertUnwindSafe(|| rt.get(c)));
    assert!(result.is_err());

    // the failure left the node stale, not wedged: the next read recomputes
    should_fail.set(false);
    assert_eq!(rt.get(c), 2);

    // and tracking works normally from here on
    rt.set(a, 5);
    assert_eq!(rt.get(c), 10);
}

#[test]
fn self_referential_effect_terminates() {
    let mut rt = Runtime::new();
    let runs = Rc::new(Cell::new(0u32));

    let a = rt.create_signal(0);
    {
        let runs = runs.clone();
        rt.create_effect(move |rt| {
            runs.set(runs.get() + 1);
            let value = rt.get(a);
            if value < 100 {
                rt.set(a, value + 1);
            }
        });
    }

    // the body both reads and writes `a`; the reentrancy guard bounds the
    // re-entries instead of looping to the fixpoint
    assert!(runs.get() >= 1);
    assert!(runs.get() < 10, "effect re-entered {} times", runs.get());

    // an external write still triggers it normally
    let before = runs.get();
    rt.set(a, 1000);
    assert_eq!(runs.get(), before + 1);
}

#[test]
fn writes_inside_an_effect_cascade_to_other_effects() {
    let mut rt = Runtime::new();
    let observed: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));

    let source = rt.create_signal(0);
    let mirror = rt.create_signal(0);

    // forwarder: writes mirror whenever source changes
    rt.create_effect(move |rt| {
        let value = rt.get(source);
        rt.set(mirror, value);
    });
    {
        let observed = observed.clone();
        rt.create_effect(move |rt| {
            let value = rt.get(mirror);
            observed.borrow_mut().push(value);
        });
    }
    assert_eq!(*observed.borrow(), vec![0]);

    rt.set(source, 7);
    assert_eq!(*observed.borrow(), vec![0, 7]);
}

#[test]
fn manual_batch_entry_points_match_the_closure_form() {
    let mut rt = Runtime::new();
    let runs = Rc::new(Cell::new(0u32));

    let a = rt.create_signal(0);
    {
        let runs = runs.clone();
        rt.create_effect(move |rt| {
            let _ = rt.get(a);
            runs.set(runs.get() + 1);
        });
    }

    rt.start_batch();
    rt.set(a, 1);
    rt.set(a, 2);
    assert_eq!(runs.get(), 1);
    rt.end_batch();
    assert_eq!(runs.get(), 2);
}
