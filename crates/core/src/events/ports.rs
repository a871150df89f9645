//! Observer interface for transport events

use authwire_domain::AuthEvent;

/// Receives every event published on the bus.
///
/// Called synchronously on the publishing task, so implementations should
/// hand heavy work off rather than block.
pub trait AuthEventListener: Send + Sync {
    fn on_event(&self, event: &AuthEvent);
}

impl<F> AuthEventListener for F
where
    F: Fn(&AuthEvent) + Send + Sync,
{
    fn on_event(&self, event: &AuthEvent) {
        self(event);
    }
}
