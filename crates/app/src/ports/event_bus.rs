//! Event bus port: publish engine events to interested subscribers.

use std::sync::Arc;

use roomctl_domain::event::Event;

/// Publishes engine events.
///
/// Publishing never fails from the engine's point of view: an event nobody
/// listens to is simply dropped.
pub trait EventPublisher: Send + Sync {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event);
}

impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    fn publish(&self, event: Event) {
        (**self).publish(event);
    }
}
