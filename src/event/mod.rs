use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

pub mod event_bus;
pub mod pattern;

/// A single notification published on the bus.
///
/// Events are value types: constructed once, never mutated, and cloned
/// freely into every matching handler. The payload type is whatever the
/// application chooses; the bus never looks inside it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event<P> {
    /// Dot-hierarchical subject name, e.g. `"order.created"`.
    pub topic: String,
    /// Opaque caller-defined payload.
    pub payload: P,
    /// Optional version tag; subscriptions may filter on it.
    pub version: Option<String>,
    /// Set at construction time.
    pub timestamp: DateTime<Utc>,
}

impl<P> Event<P> {
    pub fn new(topic: impl Into<String>, payload: P) -> Self {
        Self {
            topic: topic.into(),
            payload,
            version: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_version(topic: impl Into<String>, payload: P, version: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload,
            version: Some(version.into()),
            timestamp: Utc::now(),
        }
    }
}
