// ============================================================================
// flare-signals - Effect Run-Queue
// Queued-flag deduplicated scheduling with nested-watcher ordering
// ============================================================================

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use tracing::debug;

use crate::core::flags::Flags;
use crate::core::node::NodeKey;
use crate::primitives::{Effect, NodeHandle};
use crate::runtime::Runtime;

/// Grow-on-demand run queue. Entries are cleared as they drain; the indices
/// reset once the queue empties.
pub(crate) struct EffectQueue {
    pub(crate) slots: Vec<Option<NodeKey>>,
    pub(crate) head: usize,
}

impl EffectQueue {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            head: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.head
    }
}

impl Runtime {
    /// Queue a watcher for execution.
    ///
    /// A watcher that is itself watched by another watcher enqueues its
    /// whole chain: the walk inserts innermost-first, then the inserted
    /// segment is reversed so execution order is outer-to-inner, consistent
    /// with dependency order. The QUEUED bit deduplicates - a watcher
    /// triggered twice in one batch is enqueued once.
    pub(crate) fn notify(&mut self, key: NodeKey) {
        let start = self.queue.slots.len();
        let mut current = Some(key);
        while let Some(k) = current {
            let Some(node) = self.nodes.get_mut(k) else {
                break;
            };
            if node.flags.contains(Flags::QUEUED) {
                break;
            }
            node.flags.insert(Flags::QUEUED);
            let watcher = node.subs;
            self.queue.slots.push(Some(k));
            current = watcher.map(|l| self.links[l].sub);
        }
        self.queue.slots[start..].reverse();
    }

    /// Drain the run queue from head to tail.
    ///
    /// Every entry runs isolated: a panicking effect body does not prevent
    /// siblings already queued in the same flush from running. The first
    /// captured panic resumes once the queue has drained, so the queue
    /// bookkeeping itself can never be corrupted by a failing effect.
    pub(crate) fn flush(&mut self) {
        if self.queue.len() > 0 {
            debug!(queued = self.queue.len(), "flush");
        }
        let mut deferred_panic: Option<Box<dyn Any + Send>> = None;

        while self.queue.head < self.queue.slots.len() {
            let index = self.queue.head;
            self.queue.head += 1;
            let Some(key) = self.queue.slots[index].take() else {
                continue;
            };
            let Some(node) = self.nodes.get_mut(key) else {
                // disposed while queued
                continue;
            };
            let flags = node.flags - Flags::QUEUED;
            node.flags = flags;

            let outcome = catch_unwind(AssertUnwindSafe(|| self.run_node(key, flags)));
            if let Err(payload) = outcome {
                deferred_panic.get_or_insert(payload);
            }
        }

        self.queue.slots.clear();
        self.queue.head = 0;

        if let Some(payload) = deferred_panic {
            resume_unwind(payload);
        }
    }

    /// Force an effect to execute now, regardless of its staleness state.
    /// Used for eager or manual triggering.
    pub fn run(&mut self, effect: Effect) {
        let key = effect.key();
        if let Some(node) = self.nodes.get_mut(key) {
            let flags = (node.flags | Flags::DIRTY) - Flags::QUEUED;
            node.flags = flags;
            self.run_node(key, flags);
        }
    }

    /// Checked execution of a queued watcher.
    ///
    /// Known-stale bodies run immediately; possibly-stale ones resolve
    /// through the pull phase first. A clean watcher still walks its
    /// dependency list for queued nested watchers so those run in
    /// dependency order.
    pub(crate) fn run_node(&mut self, key: NodeKey, flags: Flags) {
        let stale = flags.contains(Flags::DIRTY)
            || (flags.contains(Flags::PENDING)
                && match self.nodes.get(key).and_then(|n| n.deps) {
                    Some(deps) => self.check_dirty(deps, key),
                    None => false,
                });
        if stale {
            self.execute_effect(key);
            return;
        }

        if flags.contains(Flags::PENDING) {
            if let Some(node) = self.nodes.get_mut(key) {
                node.flags.remove(Flags::PENDING);
            }
        }

        let mut link = self.nodes.get(key).and_then(|n| n.deps);
        while let Some(l) = link {
            let Some(&link_data) = self.links.get(l) else {
                break;
            };
            let next = link_data.next_dep;
            let dep = link_data.dep;
            if let Some(dep_node) = self.nodes.get_mut(dep) {
                if dep_node.flags.contains(Flags::QUEUED) {
                    let dep_flags = dep_node.flags - Flags::QUEUED;
                    dep_node.flags = dep_flags;
                    self.run_node(dep, dep_flags);
                }
            }
            link = next;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::runtime::Runtime;

    #[test]
    fn one_write_runs_a_watcher_once() {
        let mut rt = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = rt.create_signal(0);
        {
            let log = log.clone();
            rt.create_effect(move |rt| {
                log.borrow_mut().push(rt.get(a));
            });
        }
        assert_eq!(*log.borrow(), vec![0]);

        rt.set(a, 1);
        assert_eq!(*log.borrow(), vec![0, 1]);
    }

    #[test]
    fn queue_deduplicates_within_a_batch() {
        let mut rt = Runtime::new();
        let runs = Rc::new(RefCell::new(0u32));

        let a = rt.create_signal(0);
        let b = rt.create_signal(0);
        {
            let runs = runs.clone();
            rt.create_effect(move |rt| {
                let _ = rt.get(a) + rt.get(b);
                *runs.borrow_mut() += 1;
            });
        }
        assert_eq!(*runs.borrow(), 1);

        rt.batch(|rt| {
            rt.set(a, 1);
            rt.set(b, 1);
            rt.set(a, 2);
        });
        assert_eq!(*runs.borrow(), 2);
    }

    #[test]
    fn nested_watchers_run_outer_before_inner() {
        let mut rt = Runtime::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let outer_dep = rt.create_signal(0);
        let inner_dep = rt.create_signal(0);

        {
            let order = order.clone();
            rt.create_effect(move |rt| {
                let _ = rt.get(outer_dep);
                order.borrow_mut().push("outer");
                let order = order.clone();
                rt.create_effect(move |rt| {
                    let _ = rt.get(inner_dep);
                    order.borrow_mut().push("inner");
                });
            });
        }
        assert_eq!(*order.borrow(), vec!["outer", "inner"]);

        order.borrow_mut().clear();
        rt.batch(|rt| {
            rt.set(inner_dep, 1);
            rt.set(outer_dep, 1);
        });

        // the outer body re-ran (recreating its inner watcher); the stale
        // inner run was absorbed into the outer's execution
        assert_eq!(order.borrow().first().copied(), Some("outer"));
        assert!(order.borrow().contains(&"inner"));
    }

    #[test]
    fn manual_run_forces_execution() {
        let mut rt = Runtime::new();
        let runs = Rc::new(RefCell::new(0u32));

        let a = rt.create_signal(0);
        let effect = {
            let runs = runs.clone();
            rt.create_effect(move |rt| {
                let _ = rt.get(a);
                *runs.borrow_mut() += 1;
            })
        };
        assert_eq!(*runs.borrow(), 1);

        // nothing changed, but run() executes anyway
        rt.run(effect);
        assert_eq!(*runs.borrow(), 2);
    }
}
