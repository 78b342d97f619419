//! Client factory and configuration.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent [`RealtimeClientBuilder`] |
//! | `core` | [`RealtimeClient`] handle and public API |
//! | `options` | [`TransportOptions`] and environment loading |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for client configuration.
pub mod builder;

/// Client handle and public API.
pub mod core;

/// Transport configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::RealtimeClient;
pub use builder::RealtimeClientBuilder;
pub use options::TransportOptions;
