// ============================================================================
// flare-signals - Node & Link Data Model
// Arena-backed vertices and intrusive doubly-linked adjacency edges
// ============================================================================
//
// Nodes and links live in two generation-checked arenas owned by the
// `Runtime`. Every adjacency field is an arena key, never a reference, so
// disposal invalidates handles instead of dangling them. Node identity is
// the arena key - the lists are never searched by value equality.
// ============================================================================

use std::any::Any;
use std::rc::Rc;

use slotmap::new_key_type;

use super::flags::Flags;
use crate::runtime::Runtime;

new_key_type! {
    /// Generation-checked handle to a reactive node.
    pub struct NodeKey;

    /// Generation-checked handle to a dependency edge.
    pub struct LinkKey;
}

// =============================================================================
// ERASED VALUE PLUMBING
// =============================================================================
//
// The arenas store heterogeneous nodes, so values are `Box<dyn Any>` and the
// per-type operations (equality, clone, recompute) are resolved once at node
// construction and stored on the node.
// =============================================================================

/// Type-erased equality over two stored values.
pub(crate) type ErasedEquals = Box<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// Type-erased clone of a stored value.
pub(crate) type ErasedClone = fn(&dyn Any) -> Box<dyn Any>;

/// A computed's recompute body. Receives the runtime so it can read other
/// nodes (which registers dependency edges).
pub(crate) type ComputedFn = Rc<dyn Fn(&mut Runtime) -> Box<dyn Any>>;

/// An effect's body.
pub(crate) type EffectFn = Rc<dyn Fn(&mut Runtime)>;

pub(crate) fn clone_value<T: Clone + 'static>(value: &dyn Any) -> Box<dyn Any> {
    let value = value
        .downcast_ref::<T>()
        .expect("stored value matches the node's payload type");
    Box::new(value.clone())
}

// =============================================================================
// NODE
// =============================================================================

/// What a node is, resolved once at construction.
///
/// The recompute behavior is dispatched on this closed set - there is no
/// runtime type inspection anywhere in the engine.
pub(crate) enum NodeKind {
    /// Leaf value, externally mutated. `cached` is what readers observe;
    /// `pending` is the most recently written value. The two are reconciled
    /// by the trivial signal recompute.
    Signal {
        cached: Box<dyn Any>,
        pending: Box<dyn Any>,
        equals: ErasedEquals,
        clone: ErasedClone,
        /// Set by force-notification so the next reconcile reports a change
        /// even when the values compare equal (in-place mutation support).
        forced: bool,
    },

    /// Derived value, recomputed lazily. `value` is `None` until the first
    /// computation.
    Computed {
        getter: ComputedFn,
        value: Option<Box<dyn Any>>,
        equals: ErasedEquals,
    },

    /// Subscriber-only side-effect runner. Never read, never a value.
    Effect { body: EffectFn },

    /// Pure grouping node for disposal; no value, no body.
    Scope,
}

/// A vertex in the dependency graph.
///
/// `deps`/`deps_tail` head and tail the list of edges where this node is the
/// *subscriber*; `subs`/`subs_tail` the list where it is the *dependency*.
/// `deps_tail` doubles as the tracking cursor during a recompute: it points
/// at the most recently confirmed dependency, so re-access in the same order
/// as the previous run is recognized in O(1).
pub(crate) struct ReactiveNode {
    pub(crate) flags: Flags,
    pub(crate) deps: Option<LinkKey>,
    pub(crate) deps_tail: Option<LinkKey>,
    pub(crate) subs: Option<LinkKey>,
    pub(crate) subs_tail: Option<LinkKey>,
    pub(crate) kind: NodeKind,
}

impl ReactiveNode {
    pub(crate) fn new(flags: Flags, kind: NodeKind) -> Self {
        Self {
            flags,
            deps: None,
            deps_tail: None,
            subs: None,
            subs_tail: None,
            kind,
        }
    }
}

// =============================================================================
// LINK
// =============================================================================

/// A directed edge from a dependency to a subscriber, doubly linked into the
/// adjacency lists of both endpoints.
///
/// Invariant: a link occupies exactly one position in `dep.subs` and exactly
/// one position in `sub.deps`. The graph's link arena is the sole owner;
/// both endpoints outlive any given edge.
#[derive(Clone, Copy)]
pub(crate) struct Link {
    /// Cycle stamp from the engine, used to recognize "already linked during
    /// this recompute".
    pub(crate) version: u64,
    pub(crate) dep: NodeKey,
    pub(crate) sub: NodeKey,
    pub(crate) prev_dep: Option<LinkKey>,
    pub(crate) next_dep: Option<LinkKey>,
    pub(crate) prev_sub: Option<LinkKey>,
    pub(crate) next_sub: Option<LinkKey>,
}
