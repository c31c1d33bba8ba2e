//! Subscriber objects that handle published events.

use anyhow::Result;

use crate::event::Event;

/// Trait for event subscribers.
///
/// An alternative to closure handlers for components that carry their own
/// state; register one with [`EventBus::register_subscriber`].
///
/// [`EventBus::register_subscriber`]: crate::event::event_bus::EventBus::register_subscriber
#[async_trait::async_trait]
pub trait Subscriber<P>: Send + Sync {
    /// Called with every event that matches the subscription.
    async fn callback(&self, event: Event<P>) -> Result<()>;
}
