use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use authwire_domain::AuthEvent;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use super::ports::AuthEventListener;

const CHANNEL_CAPACITY: usize = 256;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Publish point for loading, error and token lifecycle events.
///
/// Publishing never depends on anyone listening. Listeners registered with
/// [`EventBus::subscribe`] run inline, outside the registry lock, in
/// registration order; async consumers can use
/// [`EventBus::subscribe_channel`] instead.
pub struct EventBus {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn AuthEventListener>)>>,
    next_id: AtomicU64,
    channel: broadcast::Sender<AuthEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (channel, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { listeners: RwLock::new(Vec::new()), next_id: AtomicU64::new(1), channel }
    }

    pub fn subscribe(&self, listener: Arc<dyn AuthEventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Receiver for async consumers. Lagging receivers drop old events.
    pub fn subscribe_channel(&self) -> broadcast::Receiver<AuthEvent> {
        self.channel.subscribe()
    }

    pub fn publish(&self, event: AuthEvent) {
        let listeners: Vec<Arc<dyn AuthEventListener>> =
            self.listeners.read().iter().map(|(_, listener)| Arc::clone(listener)).collect();

        trace!(event = event.name(), listeners = listeners.len(), "publishing event");
        for listener in &listeners {
            listener.on_event(&event);
        }
        // No receivers is not an error.
        let _ = self.channel.send(event);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("listeners", &self.listener_count()).finish()
    }
}
