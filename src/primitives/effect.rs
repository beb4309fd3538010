// ============================================================================
// flare-signals - Effect
// Subscriber-only side-effect runners
// ============================================================================
//
// An effect runs its body once at creation (establishing its dependency
// edges) and again whenever the flush proves one of its inputs changed. An
// effect created inside another effect or inside a scope becomes a
// dependency of that enclosing node, so disposal cascades and nested
// watchers schedule in dependency order.
// ============================================================================

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::core::flags::Flags;
use crate::core::node::{NodeKey, NodeKind, ReactiveNode};
use crate::runtime::Runtime;

use super::NodeHandle;

// =============================================================================
// HANDLE
// =============================================================================

/// Handle to an effect.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    key: NodeKey,
}

impl Effect {
    pub(crate) fn from_key(key: NodeKey) -> Self {
        Self { key }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Effect").field(&self.key).finish()
    }
}

impl NodeHandle for Effect {
    fn key(self) -> NodeKey {
        self.key
    }
}

// =============================================================================
// RUNTIME SURFACE
// =============================================================================

impl Runtime {
    /// Create an effect and run its body immediately under tracking.
    ///
    /// The body re-runs after any flush in which one of the values it read
    /// changed. Reads inside the body register dependencies; writes are
    /// allowed and propagate normally (a body writing a value it also reads
    /// is bounded by the reentrancy guard, not an error).
    pub fn create_effect(&mut self, body: impl Fn(&mut Runtime) + 'static) -> Effect {
        let kind = NodeKind::Effect {
            body: Rc::new(body),
        };
        let flags = Flags::WATCHING | Flags::MUTABLE;
        let key = self.nodes.insert(ReactiveNode::new(flags, kind));
        debug!(?key, "create effect");
        self.probe(|i| i.node_created(key, flags));

        // A nested effect is a dependency of its enclosing watcher/scope:
        // that edge drives both cascaded disposal and notify ordering.
        if let Some(sub) = self.active_sub {
            let version = self.cycle;
            self.link(key, sub, version);
        }

        self.execute_effect(key);
        Effect::from_key(key)
    }
}

// =============================================================================
// TESTS
// =============================================================================
