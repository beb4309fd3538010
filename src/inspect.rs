// ============================================================================
// flare-signals - Graph Inspection
// Observation hooks for external inspectors and devtools
// ============================================================================
//
// The engine is instrumented at eight points; with the `inspect` feature
// disabled the hook plumbing compiles to nothing, so production builds pay
// no cost. The observer only ever receives handles and flag snapshots - it
// has no way to reach back into the graph through this interface.
// ============================================================================

use crate::core::flags::Flags;
use crate::core::node::NodeKey;

/// Observer for graph activity.
///
/// Install with [`Runtime::set_inspector`](crate::Runtime::set_inspector)
/// (requires the `inspect` cargo feature). Implementations must not panic
/// and must not mutate graph state; every method defaults to a no-op so
/// observers implement only what they need.
#[allow(unused_variables)]
pub trait Inspector {
    /// A node entered the graph with the given initial flags.
    fn node_created(&self, node: NodeKey, flags: Flags) {}

    /// A node left the graph; the handle is now stale.
    fn node_disposed(&self, node: NodeKey) {}

    /// A dependency edge was created from `dep` to `sub`.
    fn edge_linked(&self, dep: NodeKey, sub: NodeKey) {}

    /// A dependency edge from `dep` to `sub` was removed.
    fn edge_unlinked(&self, dep: NodeKey, sub: NodeKey) {}

    /// A value node was read.
    fn value_read(&self, node: NodeKey) {}

    /// A signal took a new value.
    fn value_written(&self, node: NodeKey) {}

    /// A value node was force-marked stale without a plain write.
    fn value_notified(&self, node: NodeKey) {}

    /// An effect's body is about to run.
    fn effect_ran(&self, node: NodeKey) {}
}
