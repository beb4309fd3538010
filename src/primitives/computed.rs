// ============================================================================
// flare-signals - Computed
// Derived, cached, lazily-recomputed reactive values
// ============================================================================
//
// A computed never recomputes on write - only on read, and only when the
// pull phase proves an upstream value actually changed. Its dependency list
// is rebuilt on every run, so conditional reads drop stale edges
// automatically.
// ============================================================================

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::debug;

use crate::core::error::GraphError;
use crate::core::flags::Flags;
use crate::core::node::{NodeKey, NodeKind, ReactiveNode};
use crate::runtime::Runtime;

use super::{EqualsFn, NodeHandle, Readable, default_equals, erase_equals};

// =============================================================================
// HANDLE
// =============================================================================

/// Handle to a derived reactive value of type `T`.
pub struct Computed<T> {
    key: NodeKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Computed<T> {
    pub(crate) fn from_key(key: NodeKey) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Computed<T> {}

impl<T> PartialEq for Computed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Computed<T> {}

impl<T> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Computed").field(&self.key).finish()
    }
}

impl<T> NodeHandle for Computed<T> {
    fn key(self) -> NodeKey {
        self.key
    }
}

impl<T> Readable<T> for Computed<T> {}

// =============================================================================
// RUNTIME SURFACE
// =============================================================================

impl Runtime {
    /// Create a computed from a getter. The getter runs lazily on first
    /// read; recomputes short-circuit through `PartialEq`.
    pub fn create_computed<T: Clone + PartialEq + 'static>(
        &mut self,
        getter: impl Fn(&mut Runtime) -> T + 'static,
    ) -> Computed<T> {
        self.create_computed_with_equals(getter, default_equals::<T>)
    }

    /// Create a computed with a custom equality function deciding whether a
    /// recompute counts as a change for downstream consumers.
    pub fn create_computed_with_equals<T: Clone + 'static>(
        &mut self,
        getter: impl Fn(&mut Runtime) -> T + 'static,
        equals: EqualsFn<T>,
    ) -> Computed<T> {
        let kind = NodeKind::Computed {
            getter: Rc::new(move |rt: &mut Runtime| Box::new(getter(rt)) as Box<dyn Any>),
            value: None,
            equals: erase_equals(equals),
        };
        let key = self.nodes.insert(ReactiveNode::new(Flags::MUTABLE, kind));
        debug!(?key, "create computed");
        self.probe(|i| i.node_created(key, Flags::MUTABLE));
        Computed::from_key(key)
    }

    /// Force a recompute and fan the result out to subscribers.
    ///
    /// The node is marked known-stale and its subscribers scheduled exactly
    /// like a signal write; if nothing pulled the value during the flush
    /// (or a batch is open), the recompute itself still happens here.
    pub fn refresh<T: 'static>(&mut self, computed: Computed<T>) {
        let key = computed.key();
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        node.flags.insert(Flags::DIRTY);
        let subs = node.subs;
        self.probe(|i| i.value_notified(key));

        if let Some(subs) = subs {
            self.propagate(subs);
        }
        if self.batch_depth == 0 {
            self.flush();
            let still_dirty = self
                .nodes
                .get(key)
                .is_some_and(|n| n.flags.contains(Flags::DIRTY));
            if still_dirty && self.update_computed(key) {
                if let Some(subs) = self.nodes.get(key).and_then(|n| n.subs) {
                    self.shallow_propagate(subs);
                }
            }
        }
    }

    /// Computed read: resolve staleness (recomputing if the pull phase
    /// proves it necessary), then link into the active consumer.
    pub(crate) fn read_computed<T: Clone + 'static>(
        &mut self,
        key: NodeKey,
    ) -> Result<T, GraphError> {
        let flags = self
            .nodes
            .get(key)
            .ok_or(GraphError::StaleHandle)?
            .flags;
        let never_computed = match &self.nodes[key].kind {
            NodeKind::Computed { value, .. } => value.is_none(),
            _ => return Err(GraphError::TypeMismatch),
        };

        let stale = flags.contains(Flags::DIRTY)
            || (flags.contains(Flags::PENDING)
                && match self.nodes[key].deps {
                    Some(deps) => self.check_dirty(deps, key),
                    None => false,
                });
        if stale {
            if self.update_computed(key) {
                if let Some(subs) = self.nodes.get(key).and_then(|n| n.subs) {
                    self.shallow_propagate(subs);
                }
            }
        } else if flags.contains(Flags::PENDING) {
            if let Some(node) = self.nodes.get_mut(key) {
                node.flags.remove(Flags::PENDING);
            }
        } else if never_computed && !flags.contains(Flags::RECURSED_CHECK) {
            // untouched: the one lazy first computation
            self.update_computed(key);
        }

        if let Some(sub) = self.active_sub {
            let version = self.cycle;
            self.link(key, sub, version);
        }

        self.probe(|i| i.value_read(key));
        let node = self.nodes.get(key).ok_or(GraphError::StaleHandle)?;
        match &node.kind {
            NodeKind::Computed { value, .. } => match value {
                Some(value) => value
                    .downcast_ref::<T>()
                    .cloned()
                    .ok_or(GraphError::TypeMismatch),
                // mid-recompute self-read before the first value exists
                None => Err(GraphError::Cycle),
            },
            _ => Err(GraphError::TypeMismatch),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
