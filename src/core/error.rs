// ============================================================================
// flare-signals - Errors
// ============================================================================

use thiserror::Error;

/// Errors surfaced by the fallible (`try_*`) accessors.
///
/// The panicking conveniences (`get`, `set`, ...) wrap these; disposal is
/// infallible and never reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The handle's node was disposed; the generation check on the arena key
    /// failed.
    #[error("reactive node handle is stale (the node was disposed)")]
    StaleHandle,

    /// The node exists but does not hold a value of the requested type.
    #[error("reactive node does not hold a value of the requested type")]
    TypeMismatch,

    /// A computed's getter re-entered itself before producing its first
    /// value, so there is no cached value to return.
    #[error("computed getter re-entered itself before producing a value")]
    Cycle,
}
