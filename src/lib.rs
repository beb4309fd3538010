// ============================================================================
// flare-signals - A Push-Pull Reactive Dependency Graph for Rust
// ============================================================================
//
// Writes eagerly mark downstream nodes possibly-stale (push); derived
// values only actually recompute when read or when a pull proves an input
// changed. Effects run through a batched, deduplicated queue. The whole
// graph lives in one `Runtime` value - arenas of nodes and edges addressed
// by generation-checked handles, no process-wide state.
// ============================================================================

//! Fine-grained reactivity: signals, computeds, and effects over an
//! explicit runtime.
//!
//! ```
//! use flare_signals::Runtime;
//!
//! let mut rt = Runtime::new();
//!
//! let count = rt.create_signal(1);
//! let doubled = rt.create_computed(move |rt| rt.get(count) * 2);
//!
//! let _effect = rt.create_effect(move |rt| {
//!     let _ = rt.get(doubled);
//! });
//!
//! rt.batch(|rt| {
//!     rt.set(count, 2);
//!     rt.set(count, 3);
//! });
//! assert_eq!(rt.get(doubled), 6);
//! ```

pub mod core;
pub mod inspect;
pub mod primitives;
pub mod reactivity;
pub mod runtime;

// Re-export the working surface at the crate root
// (self:: disambiguates the module from the `core` crate)
pub use self::core::error::GraphError;
pub use self::core::flags::Flags;
pub use self::core::node::{LinkKey, NodeKey};
pub use inspect::Inspector;
pub use primitives::{
    Computed, Effect, EqualsFn, NodeHandle, Readable, Scope, Signal, default_equals, never_equals,
};
pub use runtime::Runtime;

// =============================================================================
// TESTS
// =============================================================================
