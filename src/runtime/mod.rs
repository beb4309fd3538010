// ============================================================================
// flare-signals - Runtime
// Engine state: arenas, cycle stamping, batching, and the recompute bodies
// ============================================================================
//
// One `Runtime` is one reactive universe. All graph state lives here - there
// is no process-wide singleton, so independent graphs can coexist and tear
// down cleanly. Everything is single-threaded and synchronous: no operation
// suspends, and batching only defers the effect flush, never the
// dirty-marking itself.
// ============================================================================

pub mod queue;

use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::core::flags::Flags;
use crate::core::node::{Link, LinkKey, NodeKey, NodeKind, ReactiveNode};
use crate::primitives::NodeHandle;
use queue::EffectQueue;

#[cfg(feature = "inspect")]
use crate::inspect::Inspector;
#[cfg(feature = "inspect")]
use std::rc::Rc;

/// The reactive engine.
///
/// Owns the node and link arenas plus the scheduler state. Handles returned
/// by the constructors (`create_signal`, `create_computed`, ...) are `Copy`
/// keys into the arenas; all access goes through `&mut self` methods.
///
/// # Example
///
/// ```
/// use flare_signals::Runtime;
///
/// let mut rt = Runtime::new();
/// let count = rt.create_signal(0i32);
/// let doubled = rt.create_computed(move |rt| rt.get(count) * 2);
///
/// rt.set(count, 5);
/// assert_eq!(rt.get(doubled), 10);
/// ```
pub struct Runtime {
    pub(crate) nodes: SlotMap<NodeKey, ReactiveNode>,
    pub(crate) links: SlotMap<LinkKey, Link>,

    /// Monotonic stamp, bumped at the start of every recompute. Stored on
    /// links to recognize "already linked this cycle".
    pub(crate) cycle: u64,

    /// Nesting depth of `start_batch`/`end_batch`; the flush only runs when
    /// the outermost batch unwinds.
    pub(crate) batch_depth: u32,

    /// The node currently recomputing; reads register dependency edges
    /// against it. Saved and restored around every recompute so nested
    /// recomputes compose.
    pub(crate) active_sub: Option<NodeKey>,

    pub(crate) queue: EffectQueue,

    #[cfg(feature = "inspect")]
    pub(crate) inspector: Option<Rc<dyn Inspector>>,
}

impl Runtime {
    /// Create an empty reactive universe.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            links: SlotMap::with_key(),
            cycle: 0,
            batch_depth: 0,
            active_sub: None,
            queue: EffectQueue::new(),
            #[cfg(feature = "inspect")]
            inspector: None,
        }
    }

    /// Install the graph observer. Pass `None` to detach.
    ///
    /// The observer receives handle and flag snapshots only; it must not
    /// call back into the runtime and must not panic.
    #[cfg(feature = "inspect")]
    pub fn set_inspector(&mut self, inspector: Option<Rc<dyn Inspector>>) {
        self.inspector = inspector;
    }

    #[cfg(feature = "inspect")]
    #[inline]
    pub(crate) fn probe(&self, f: impl FnOnce(&dyn Inspector)) {
        if let Some(inspector) = &self.inspector {
            f(inspector.as_ref());
        }
    }

    #[cfg(not(feature = "inspect"))]
    #[inline(always)]
    pub(crate) fn probe(&self, _f: impl FnOnce(&dyn crate::inspect::Inspector)) {}

    // =========================================================================
    // BATCHING
    // =========================================================================

    /// Enter a batch: effect execution is deferred until the matching
    /// `end_batch`. Reads still observe the latest written values.
    pub fn start_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Leave a batch; the outermost `end_batch` flushes the effect queue.
    pub fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 {
            self.flush();
        }
    }

    /// Run `f` inside a batch. Batches nest; only the outermost unwind
    /// flushes. The batch is exited (and flushed) even if `f` panics.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.start_batch();
        let result = catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.end_batch();
        match result {
            Ok(value) => value,
            Err(payload) => resume_unwind(payload),
        }
    }

    /// Whether a batch is currently open.
    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Run `f` without registering dependencies: reads inside the closure
    /// do not link into the currently recomputing node.
    pub fn untracked<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = self.active_sub.take();
        let result = catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.active_sub = prev;
        match result {
            Ok(value) => value,
            Err(payload) => resume_unwind(payload),
        }
    }

    // =========================================================================
    // RECOMPUTE BODIES
    // =========================================================================

    /// Recompute dispatch, resolved by node kind. Returns whether the
    /// node's value changed.
    pub(crate) fn update_node(&mut self, key: NodeKey) -> bool {
        enum Tag {
            Signal,
            Computed,
            Effect,
            Inert,
        }
        let tag = match self.nodes.get(key) {
            Some(node) => match node.kind {
                NodeKind::Signal { .. } => Tag::Signal,
                NodeKind::Computed { .. } => Tag::Computed,
                NodeKind::Effect { .. } => Tag::Effect,
                NodeKind::Scope => Tag::Inert,
            },
            None => Tag::Inert,
        };
        match tag {
            Tag::Signal => self.update_signal(key),
            Tag::Computed => self.update_computed(key),
            Tag::Effect => {
                // A pull reached a nested watcher whose inputs changed:
                // its body runs now, and it has no value of its own.
                self.execute_effect(key);
                false
            }
            Tag::Inert => false,
        }
    }

    /// The trivial signal recompute: reconcile the cached value with the
    /// last written one. Returns whether readers will observe a change.
    pub(crate) fn update_signal(&mut self, key: NodeKey) -> bool {
        let Some(node) = self.nodes.get_mut(key) else {
            return false;
        };
        node.flags -= Flags::STALE_MASK;
        match &mut node.kind {
            NodeKind::Signal {
                cached,
                pending,
                equals,
                clone,
                forced,
            } => {
                let force = std::mem::replace(forced, false);
                let changed = force || !equals(pending.as_ref(), cached.as_ref());
                if changed {
                    *cached = clone(pending.as_ref());
                }
                changed
            }
            _ => false,
        }
    }

    /// Run a computed's getter under tracking and store the result.
    /// Returns whether the value changed.
    ///
    /// The bookkeeping (restoring `active_sub`, clearing the reentrancy
    /// guard, pruning unreconfirmed dependencies) runs even when the getter
    /// panics; the staleness flag is re-set in that case so the next read
    /// recomputes again.
    pub(crate) fn update_computed(&mut self, key: NodeKey) -> bool {
        let getter = match self.nodes.get(key) {
            Some(node) => match &node.kind {
                NodeKind::Computed { getter, .. } => getter.clone(),
                _ => return false,
            },
            None => return false,
        };

        self.cycle += 1;
        {
            let node = &mut self.nodes[key];
            node.deps_tail = None;
            node.flags =
                (node.flags - (Flags::RECURSED | Flags::STALE_MASK)) | Flags::RECURSED_CHECK;
        }
        trace!(?key, cycle = self.cycle, "recompute");

        let prev = self.active_sub.replace(key);
        let result = catch_unwind(AssertUnwindSafe(|| getter(&mut *self)));
        self.active_sub = prev;
        if let Some(node) = self.nodes.get_mut(key) {
            node.flags.remove(Flags::RECURSED_CHECK);
        }
        self.purge_deps(key);

        match result {
            Ok(new_value) => {
                let Some(node) = self.nodes.get_mut(key) else {
                    return false;
                };
                match &mut node.kind {
                    NodeKind::Computed { value, equals, .. } => {
                        let changed = match value.as_ref() {
                            Some(old) => !equals(old.as_ref(), new_value.as_ref()),
                            None => true,
                        };
                        *value = Some(new_value);
                        changed
                    }
                    _ => false,
                }
            }
            Err(payload) => {
                if let Some(node) = self.nodes.get_mut(key) {
                    node.flags.insert(Flags::DIRTY);
                }
                resume_unwind(payload);
            }
        }
    }

    /// Run an effect's body under tracking. Same bookkeeping guarantees as
    /// `update_computed`.
    pub(crate) fn execute_effect(&mut self, key: NodeKey) {
        let body = match self.nodes.get(key) {
            Some(node) => match &node.kind {
                NodeKind::Effect { body } => body.clone(),
                _ => return,
            },
            None => return,
        };

        self.cycle += 1;
        {
            let node = &mut self.nodes[key];
            node.deps_tail = None;
            node.flags =
                (node.flags - (Flags::RECURSED | Flags::STALE_MASK)) | Flags::RECURSED_CHECK;
        }
        trace!(?key, cycle = self.cycle, "run effect");
        self.probe(|i| i.effect_ran(key));

        let prev = self.active_sub.replace(key);
        let result = catch_unwind(AssertUnwindSafe(|| body(&mut *self)));
        self.active_sub = prev;
        if let Some(node) = self.nodes.get_mut(key) {
            node.flags.remove(Flags::RECURSED_CHECK);
        }
        self.purge_deps(key);

        // A panicking body still comes out clean: effects are write-driven,
        // so the retry happens when an input next changes, and a node left
        // stale here would be skipped by the push phase as already-marked.
        if let Err(payload) = result {
            resume_unwind(payload);
        }
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// A dependency's subscriber list just became empty.
    ///
    /// Value nodes are reset for lazy revival: their own dependency edges
    /// are dropped and they recompute from scratch if ever observed again.
    /// Watcher nodes have nothing to keep alive and are disposed.
    pub(crate) fn unwatched(&mut self, key: NodeKey) {
        enum Tag {
            Value,
            Watcher,
        }
        let tag = match self.nodes.get(key) {
            Some(node) => match node.kind {
                NodeKind::Signal { .. } | NodeKind::Computed { .. } => Tag::Value,
                NodeKind::Effect { .. } | NodeKind::Scope => Tag::Watcher,
            },
            None => return,
        };
        match tag {
            Tag::Value => {
                let node = &mut self.nodes[key];
                node.deps_tail = None;
                node.flags = Flags::MUTABLE | Flags::DIRTY;
                self.purge_deps(key);
            }
            Tag::Watcher => self.dispose_key(key),
        }
    }

    /// Dispose a node through any handle type: every edge in both adjacency
    /// lists is unlinked and the node leaves the arena, invalidating all
    /// handles to it. Disposing an already-disposed node is a no-op.
    pub fn dispose(&mut self, handle: impl NodeHandle) {
        self.dispose_key(handle.key());
    }

    pub(crate) fn dispose_key(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        debug!(?key, "dispose");
        node.flags = Flags::empty();

        // Drop the node's own dependency edges.
        let mut dep = node.deps;
        while let Some(link) = dep {
            dep = self.unlink(link, key);
        }

        // Unlink the full subscriber chain: the node is no longer a valid
        // dependency for anyone. `unwatched(key)` can re-enter here when
        // the chain empties; the re-entry finds nothing left to do.
        loop {
            let Some(node) = self.nodes.get(key) else {
                return;
            };
            let Some(link) = node.subs else {
                break;
            };
            let sub = self.links[link].sub;
            self.unlink(link, sub);
        }

        if self.nodes.remove(key).is_some() {
            self.probe(|i| i.node_disposed(key));
        }
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Whether the handle still refers to a live node.
    pub fn contains(&self, handle: impl NodeHandle) -> bool {
        self.nodes.contains_key(handle.key())
    }

    /// Number of live nodes in this universe.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live dependency edges in this universe.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Number of dependencies the node currently tracks.
    pub fn dep_count(&self, handle: impl NodeHandle) -> usize {
        let mut count = 0;
        let mut link = self.nodes.get(handle.key()).and_then(|n| n.deps);
        while let Some(l) = link {
            count += 1;
            link = self.links[l].next_dep;
        }
        count
    }

    /// Number of subscribers currently tracking the node.
    pub fn sub_count(&self, handle: impl NodeHandle) -> usize {
        let mut count = 0;
        let mut link = self.nodes.get(handle.key()).and_then(|n| n.subs);
        while let Some(l) = link {
            count += 1;
            link = self.links[l].next_sub;
        }
        count
    }

    /// Snapshot of the node's state bits, if it is still alive.
    pub fn flags_of(&self, handle: impl NodeHandle) -> Option<Flags> {
        self.nodes.get(handle.key()).map(|n| n.flags)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
