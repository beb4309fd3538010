// ============================================================================
// flare-signals - Signal
// Leaf mutable reactive values
// ============================================================================
//
// A signal node carries two values: the cached one readers observe and the
// pending one writers last stored. The write path compares against the
// pending value - an unchanged write never propagates, which is the single
// most important performance invariant of the engine. The cached value
// catches up through the trivial signal recompute on the next read or pull.
// ============================================================================

use std::fmt;
use std::marker::PhantomData;

use tracing::debug;

use crate::core::error::GraphError;
use crate::core::flags::Flags;
use crate::core::node::{NodeKey, NodeKind, ReactiveNode, clone_value};
use crate::runtime::Runtime;

use super::{EqualsFn, NodeHandle, Readable, default_equals, erase_equals};

// =============================================================================
// HANDLE
// =============================================================================

/// Handle to a leaf mutable reactive value of type `T`.
pub struct Signal<T> {
    key: NodeKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Signal<T> {
    pub(crate) fn from_key(key: NodeKey) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Signal<T> {}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signal").field(&self.key).finish()
    }
}

impl<T> NodeHandle for Signal<T> {
    fn key(self) -> NodeKey {
        self.key
    }
}

impl<T> Readable<T> for Signal<T> {}

// =============================================================================
// RUNTIME SURFACE
// =============================================================================

impl Runtime {
    /// Create a signal holding `value`. Writes short-circuit through
    /// `PartialEq`.
    pub fn create_signal<T: Clone + PartialEq + 'static>(&mut self, value: T) -> Signal<T> {
        self.create_signal_with_equals(value, default_equals::<T>)
    }

    /// Create a signal with a custom equality function deciding whether a
    /// write counts as a change. Use [`never_equals`](super::never_equals)
    /// for payloads without `PartialEq`.
    pub fn create_signal_with_equals<T: Clone + 'static>(
        &mut self,
        value: T,
        equals: EqualsFn<T>,
    ) -> Signal<T> {
        let kind = NodeKind::Signal {
            cached: Box::new(value.clone()),
            pending: Box::new(value),
            equals: erase_equals(equals),
            clone: clone_value::<T>,
            forced: false,
        };
        let key = self.nodes.insert(ReactiveNode::new(Flags::MUTABLE, kind));
        debug!(?key, "create signal");
        self.probe(|i| i.node_created(key, Flags::MUTABLE));
        Signal::from_key(key)
    }

    /// Write a value.
    ///
    /// # Panics
    ///
    /// Panics when the handle is stale or the payload type does not match;
    /// use [`Runtime::try_set`] for the fallible form.
    pub fn set<T: 'static>(&mut self, signal: Signal<T>, value: T) {
        if let Err(err) = self.try_set(signal, value) {
            panic!("flare-signals: set failed: {err}");
        }
    }

    /// Fallible write. When the new value equals the last written one this
    /// is a complete no-op: nothing is marked and no effect is scheduled.
    pub fn try_set<T: 'static>(&mut self, signal: Signal<T>, value: T) -> Result<(), GraphError> {
        let key = signal.key();
        let node = self.nodes.get_mut(key).ok_or(GraphError::StaleHandle)?;
        let subs = match &mut node.kind {
            NodeKind::Signal {
                pending, equals, ..
            } => {
                if pending.downcast_ref::<T>().is_none() {
                    return Err(GraphError::TypeMismatch);
                }
                if equals(pending.as_ref(), &value) {
                    return Ok(());
                }
                *pending = Box::new(value);
                node.flags.insert(Flags::DIRTY);
                node.subs
            }
            _ => return Err(GraphError::TypeMismatch),
        };

        self.probe(|i| i.value_written(key));
        if let Some(subs) = subs {
            self.propagate(subs);
            if self.batch_depth == 0 {
                self.flush();
            }
        }
        Ok(())
    }

    /// Mutate the stored value in place and propagate unconditionally.
    ///
    /// This is the write path for collection-like payloads where cloning
    /// into `set` would be wasteful; in-place mutation always counts as a
    /// change.
    pub fn update<T: 'static>(&mut self, signal: Signal<T>, f: impl FnOnce(&mut T)) {
        if let Err(err) = self.try_update(signal, f) {
            panic!("flare-signals: update failed: {err}");
        }
    }

    /// Fallible in-place mutation.
    pub fn try_update<T: 'static>(
        &mut self,
        signal: Signal<T>,
        f: impl FnOnce(&mut T),
    ) -> Result<(), GraphError> {
        let key = signal.key();
        let node = self.nodes.get_mut(key).ok_or(GraphError::StaleHandle)?;
        match &mut node.kind {
            NodeKind::Signal {
                pending, forced, ..
            } => {
                let value = pending
                    .downcast_mut::<T>()
                    .ok_or(GraphError::TypeMismatch)?;
                f(value);
                *forced = true;
            }
            _ => return Err(GraphError::TypeMismatch),
        }
        self.force_propagate(key);
        Ok(())
    }

    /// Force-mark a signal stale without changing its value, scheduling its
    /// watchers as if a new value had been written. For payloads mutated
    /// behind the engine's back.
    pub fn notify_signal<T: 'static>(&mut self, signal: Signal<T>) {
        let key = signal.key();
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        match &mut node.kind {
            NodeKind::Signal { forced, .. } => *forced = true,
            _ => return,
        }
        self.force_propagate(key);
    }

    fn force_propagate(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        node.flags.insert(Flags::DIRTY);
        let subs = node.subs;
        self.probe(|i| i.value_notified(key));
        if let Some(subs) = subs {
            self.propagate(subs);
            if self.batch_depth == 0 {
                self.flush();
            }
        }
    }

    /// Signal read: reconcile a stale cached value, then link into the
    /// nearest consumer - walking up through grouping nodes to the first
    /// one that actually tracks dependencies.
    pub(crate) fn read_signal<T: Clone + 'static>(
        &mut self,
        key: NodeKey,
    ) -> Result<T, GraphError> {
        let flags = self
            .nodes
            .get(key)
            .ok_or(GraphError::StaleHandle)?
            .flags;
        if flags.contains(Flags::DIRTY) && self.update_signal(key) {
            if let Some(subs) = self.nodes.get(key).and_then(|n| n.subs) {
                self.shallow_propagate(subs);
            }
        }

        let mut consumer = self.active_sub;
        while let Some(sub) = consumer {
            let Some(node) = self.nodes.get(sub) else {
                break;
            };
            if node.flags.intersects(Flags::MUTABLE | Flags::WATCHING) {
                let version = self.cycle;
                self.link(key, sub, version);
                break;
            }
            consumer = node.subs.map(|l| self.links[l].sub);
        }

        self.probe(|i| i.value_read(key));
        let node = self.nodes.get(key).ok_or(GraphError::StaleHandle)?;
        match &node.kind {
            NodeKind::Signal { cached, .. } => cached
                .downcast_ref::<T>()
                .cloned()
                .ok_or(GraphError::TypeMismatch),
            _ => Err(GraphError::TypeMismatch),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
