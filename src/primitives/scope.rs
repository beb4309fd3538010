// ============================================================================
// flare-signals - Scope
// Grouping node for batch disposal of effects
// ============================================================================
//
// A scope carries no value and no body; effects (and nested scopes) created
// while it is active become its dependencies, so disposing the scope tears
// all of them down in one call. Reads inside a scope's closure do not link
// to the scope itself - the consumer walk skips grouping nodes.
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use tracing::debug;

use crate::core::flags::Flags;
use crate::core::node::{NodeKey, NodeKind, ReactiveNode};
use crate::runtime::Runtime;

use super::NodeHandle;

// =============================================================================
// HANDLE
// =============================================================================

/// Handle to an effect scope.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    key: NodeKey,
}

impl Scope {
    pub(crate) fn from_key(key: NodeKey) -> Self {
        Self { key }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Scope").field(&self.key).finish()
    }
}

impl NodeHandle for Scope {
    fn key(self) -> NodeKey {
        self.key
    }
}

// =============================================================================
// RUNTIME SURFACE
// =============================================================================

impl Runtime {
    /// Create a scope. A scope created while another scope or effect is
    /// active nests under it and is disposed along with it.
    pub fn create_scope(&mut self) -> Scope {
        let key = self
            .nodes
            .insert(ReactiveNode::new(Flags::empty(), NodeKind::Scope));
        debug!(?key, "create scope");
        self.probe(|i| i.node_created(key, Flags::empty()));

        if let Some(sub) = self.active_sub {
            let version = self.cycle;
            self.link(key, sub, version);
        }

        Scope::from_key(key)
    }

    /// Run `f` with the scope active: effects created inside are collected
    /// by the scope and torn down when it is disposed.
    pub fn run_scope<R>(&mut self, scope: Scope, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = self.active_sub.replace(scope.key());
        let result = catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.active_sub = prev;
        match result {
            Ok(value) => value,
            Err(payload) => resume_unwind(payload),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
