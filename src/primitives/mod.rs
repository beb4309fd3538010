// ============================================================================
// flare-signals - Primitives Module
// Typed handles over the graph: signal, computed, effect, scope
// ============================================================================
//
// Handles are `Copy` arena keys tagged with the payload type. They stay
// valid across arena growth and are generation-checked, so a disposed
// node's handles fail gracefully instead of dangling.
// ============================================================================

pub mod computed;
pub mod effect;
pub mod scope;
pub mod signal;

pub use computed::Computed;
pub use effect::Effect;
pub use scope::Scope;
pub use signal::Signal;

use std::any::Any;

use crate::core::error::GraphError;
use crate::core::node::{ErasedEquals, NodeKey, NodeKind};
use crate::runtime::Runtime;

// =============================================================================
// HANDLE TRAITS
// =============================================================================

/// Anything that identifies a node in the graph. Implemented by all four
/// handle types; used by `Runtime::dispose` and the introspection helpers.
pub trait NodeHandle: Copy {
    fn key(self) -> NodeKey;
}

/// A handle whose node produces a value of type `T` when read: signals and
/// computeds. Effects and scopes are not readable.
pub trait Readable<T>: NodeHandle {}

impl Runtime {
    /// Read a signal or computed, registering a dependency edge when a
    /// recompute is active.
    ///
    /// # Panics
    ///
    /// Panics when the handle is stale or its payload type does not match;
    /// use [`Runtime::try_get`] for the fallible form.
    pub fn get<T: Clone + 'static>(&mut self, source: impl Readable<T>) -> T {
        match self.try_get(source) {
            Ok(value) => value,
            Err(err) => panic!("flare-signals: get failed: {err}"),
        }
    }

    /// Fallible read of a signal or computed.
    pub fn try_get<T: Clone + 'static>(
        &mut self,
        source: impl Readable<T>,
    ) -> Result<T, GraphError> {
        enum Tag {
            Signal,
            Computed,
            Other,
        }
        let key = source.key();
        let tag = match self.nodes.get(key) {
            Some(node) => match node.kind {
                NodeKind::Signal { .. } => Tag::Signal,
                NodeKind::Computed { .. } => Tag::Computed,
                _ => Tag::Other,
            },
            None => return Err(GraphError::StaleHandle),
        };
        match tag {
            Tag::Signal => self.read_signal::<T>(key),
            Tag::Computed => self.read_computed::<T>(key),
            Tag::Other => Err(GraphError::TypeMismatch),
        }
    }
}

// =============================================================================
// EQUALITY
// =============================================================================

/// Equality function used to short-circuit writes and recomputes.
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Default equality using `PartialEq`.
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Never-equal: every write and every recompute counts as a change. The
/// escape hatch for payloads without a usable `PartialEq`.
pub fn never_equals<T>(_: &T, _: &T) -> bool {
    false
}

/// Monomorphize a typed equality function into the erased form stored on
/// nodes.
pub(crate) fn erase_equals<T: 'static>(equals: EqualsFn<T>) -> ErasedEquals {
    Box::new(
        move |a: &dyn Any, b: &dyn Any| match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => equals(a, b),
            _ => false,
        },
    )
}

// =============================================================================
// TESTS
// =============================================================================
