//! Subscriber callback handles.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

// ============================================================================
// Callback
// ============================================================================

/// A shared, cloneable subscriber function.
///
/// Identity is the underlying allocation: clones of one `Callback` are the
/// same subscriber, two `Callback::new` calls are different subscribers even
/// when built from identical closures. Keep a clone of the handle you pass to
/// [`RealtimeClient::subscribe`](crate::RealtimeClient::subscribe) to be able
/// to unsubscribe it later.
///
/// # Example
///
/// ```
/// use realtime_notify::Callback;
///
/// let a = Callback::new(|data| println!("{data}"));
/// let b = a.clone();
/// let c = Callback::new(|data| println!("{data}"));
///
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&Value) + Send + Sync + 'static>);

impl Callback {
    /// Wraps a function as a subscriber callback.
    #[inline]
    #[must_use]
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invokes the callback.
    #[inline]
    pub fn call(&self, data: &Value) {
        (self.0)(data);
    }

    /// Returns `true` if both handles point to the same subscriber.
    #[inline]
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Callback {}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
