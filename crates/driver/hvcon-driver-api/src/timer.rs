//! Deferred-work timers.

use core::time::Duration;

/// A one-shot timer owned by a driver instance.
///
/// The platform delivers the expiry on its deferred-work context by calling
/// back into the driver (see [`UartCallbacks`](crate::UartCallbacks)). A
/// callback for a given timer never runs concurrently with itself.
pub trait DeferredTimer: Send + Sync {
    /// Arms the timer to fire once after `after`. Re-arming replaces any
    /// pending expiry.
    fn arm(&self, after: Duration);

    /// Cancels a pending expiry. Cancelling an idle timer is a no-op.
    fn cancel(&self);
}
