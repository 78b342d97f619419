//! Subscription bookkeeping.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `callback` | Shared subscriber handles with pointer identity |
//! | `registry` | Topic → callbacks map, replayed on reconnect |

// ============================================================================
// Submodules
// ============================================================================

/// Subscriber callback handles.
pub mod callback;

/// Topic → callback registry.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use callback::Callback;
pub use registry::{Registry, Removal};
