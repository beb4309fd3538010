//! Graph semantics: marking, lazy pulls, and dependency bookkeeping.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use flare_signals::Runtime;

#[test]
fn diamond_updates_coalesce_into_one_effect_run() {
    //      a
    //     / \
    //    b   c
    //     \ /
    //   effect
    let mut rt = Runtime::new();
    let log: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));

    let a = rt.create_signal(1);
    let b = rt.create_computed(move |rt| rt.get(a) + 1);
    let c = rt.create_computed(move |rt| rt.get(a) * 2);
    {
        let log = log.clone();
        rt.create_effect(move |rt| {
            let sum = rt.get(b) + rt.get(c);
            log.borrow_mut().push(sum);
        });
    }
    assert_eq!(*log.borrow(), vec![4]); // 2 + 2

    rt.set(a, 2);

    // exactly one more run, observing b=3 and c=4 together
    assert_eq!(*log.borrow(), vec![4, 7]);
}

#[test]
fn computed_body_runs_at_most_once_per_change() {
    let mut rt = Runtime::new();
    let runs = Rc::new(Cell::new(0u32));

    let a = rt.create_signal(1);
    let doubled = {
        let runs = runs.clone();
        rt.create_computed(move |rt| {
            runs.set(runs.get() + 1);
            rt.get(a) * 2
        })
    };

    for _ in 0..10 {
        assert_eq!(rt.get(doubled), 2);
    }
    assert_eq!(runs.get(), 1);

    rt.set(a, 3);
    for _ in 0..10 {
        assert_eq!(rt.get(doubled), 6);
    }
    assert_eq!(runs.get(), 2);
}

#[test]
fn unchanged_write_schedules_nothing() {
    let mut rt = Runtime::new();
    let runs = Rc::new(Cell::new(0u32));

    let a = rt.create_signal(42);
    {
        let runs = runs.clone();
        rt.create_effect(move |rt| {
            let _ = rt.get(a);
            runs.set(runs.get() + 1);
        });
    }
    assert_eq!(runs.get(), 1);

    for _ in 0..5 {
        rt.set(a, 42);
    }
    assert_eq!(runs.get(), 1);

    rt.set(a, 43);
    assert_eq!(runs.get(), 2);
}

#[test]
fn recomputes_never_leave_duplicate_edges() {
    let mut rt = Runtime::new();
    let a = rt.create_signal(1);
    let b = rt.create_signal(2);

    // reads a twice, b once, in varying effective order
    let c = rt.create_computed(move |rt| {
        let first = rt.get(a);
        let second = rt.get(b);
        first + second + rt.get(a)
    });

    assert_eq!(rt.get(c), 4);
    assert_eq!(rt.dep_count(c), 2);

    for i in 0..10 {
        rt.set(a, i);
        let _ = rt.get(c);
        rt.set(b, i * 7);
        let _ = rt.get(c);
        assert_eq!(rt.dep_count(c), 2, "edge list grew on iteration {i}");
    }
}

#[test]
fn conditional_dependency_is_dropped_when_the_branch_flips() {
    let mut rt = Runtime::new();
    let runs = Rc::new(Cell::new(0u32));

    let flag = rt.create_signal(true);
    let a = rt.create_signal(10);
    let b = rt.create_signal(20);

    let picked = {
        let runs = runs.clone();
        rt.create_computed(move |rt| {
            runs.set(runs.get() + 1);
            if rt.get(flag) { rt.get(a) } else { rt.get(b) }
        })
    };

    assert_eq!(rt.get(picked), 10);
    assert_eq!(rt.dep_count(picked), 2); // flag + a
    assert_eq!(runs.get(), 1);

    // while the branch reads a, b is invisible
    rt.set(b, 21);
    assert_eq!(rt.get(picked), 10);
    assert_eq!(runs.get(), 1);

    // flip: the recompute re-tracks flag + b and drops a
    rt.set(flag, false);
    assert_eq!(rt.get(picked), 21);
    assert_eq!(rt.dep_count(picked), 2); // flag + b
    assert_eq!(rt.sub_count(a), 0);
    let runs_after_flip = runs.get();

    // a is no longer tracked
    rt.set(a, 11);
    assert_eq!(rt.get(picked), 21);
    assert_eq!(runs.get(), runs_after_flip);

    // b now is
    rt.set(b, 22);
    assert_eq!(rt.get(picked), 22);
    assert_eq!(runs.get(), runs_after_flip + 1);
}

#[test]
fn long_chains_resolve_without_deep_recursion() {
    let mut rt = Runtime::new();
    let a = rt.create_signal(0i64);

    // a -> c1 -> c2 -> ... -> c200
    let mut last = rt.create_computed(move |rt| rt.get(a) + 1);
    for _ in 1..200 {
        let prev = last;
        last = rt.create_computed(move |rt| rt.get(prev) + 1);
    }

    assert_eq!(rt.get(last), 200);

    rt.set(a, 1000);
    assert_eq!(rt.get(last), 1200);
}

#[test]
fn wide_fanout_marks_every_subscriber() {
    let mut rt = Runtime::new();
    let runs = Rc::new(Cell::new(0u32));

    let a = rt.create_signal(0);
    for i in 0..50 {
        let runs = runs.clone();
        let scaled = rt.create_computed(move |rt| rt.get(a) * i);
        rt.create_effect(move |rt| {
            let _ = rt.get(scaled);
            runs.set(runs.get() + 1);
        });
    }
    assert_eq!(runs.get(), 50);

    rt.set(a, 1);
    // every effect whose computed changed re-ran; the i=0 computed
    // produced an equal value and its watcher stayed quiet
    assert_eq!(runs.get(), 99);
}

#[test]
fn unchanged_intermediate_results_short_circuit_downstream() {
    let mut rt = Runtime::new();
    let runs = Rc::new(Cell::new(0u32));

    let n = rt.create_signal(1);
    let parity = rt.create_computed(move |rt| rt.get(n) % 2);
    {
        let runs = runs.clone();
        rt.create_effect(move |rt| {
            let _ = rt.get(parity);
            runs.set(runs.get() + 1);
        });
    }
    assert_eq!(runs.get(), 1);

    // 1 -> 3 -> 5: parity never changes, the effect never runs
    rt.set(n, 3);
    rt.set(n, 5);
    assert_eq!(runs.get(), 1);

    rt.set(n, 6);
    assert_eq!(runs.get(), 2);
}

#[test]
fn notify_forces_watchers_without_a_value_change() {
    let mut rt = Runtime::new();
    let observed: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));

    let items = rt.create_signal(vec![1, 2, 3]);
    {
        let observed = observed.clone();
        rt.create_effect(move |rt| {
            let len = rt.get(items).len();
            observed.borrow_mut().push(len);
        });
    }
    assert_eq!(*observed.borrow(), vec![3]);

    // in-place mutation followed by an explicit notify
    rt.update(items, |v| v.push(4));
    assert_eq!(*observed.borrow(), vec![3, 4]);

    // notify alone also re-runs watchers, even though nothing changed
    rt.notify_signal(items);
    assert_eq!(*observed.borrow(), vec![3, 4, 4]);
}
