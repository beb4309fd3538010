// ============================================================================
// flare-signals - Node State Flags
// The bitset driving the push-pull propagation state machine
// ============================================================================

use bitflags::bitflags;

bitflags! {
    /// Per-node state bits.
    ///
    /// Every node moves through `empty -> PENDING -> DIRTY -> (recomputed) ->
    /// empty/PENDING`, with `RECURSED_CHECK`/`RECURSED` as a transient
    /// reentrancy sub-state during an active recompute. `WATCHING` and
    /// `QUEUED` are orthogonal scheduling bits.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Flags: u8 {
        /// Node can be recomputed / has a dependency list worth checking.
        const MUTABLE = 1 << 0;

        /// Node is an effect-like consumer that must be scheduled on change.
        const WATCHING = 1 << 1;

        /// Node is currently being recomputed (reentrancy guard).
        const RECURSED_CHECK = 1 << 2;

        /// Node was revisited during its own recomputation.
        const RECURSED = 1 << 3;

        /// Known-stale: must recompute before the next read.
        const DIRTY = 1 << 4;

        /// Possibly-stale: staleness is resolved lazily via the pull phase.
        const PENDING = 1 << 5;

        /// Node is already sitting in the effect run-queue.
        const QUEUED = 1 << 6;
    }
}

impl Flags {
    /// Both reentrancy-guard bits.
    pub const RECURSED_MASK: Flags = Flags::RECURSED_CHECK.union(Flags::RECURSED);

    /// Both staleness bits.
    pub const STALE_MASK: Flags = Flags::DIRTY.union(Flags::PENDING);
}

// =============================================================================
// TESTS
// =============================================================================
