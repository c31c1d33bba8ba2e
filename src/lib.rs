//! topic-bus - An in-process topic-based publish/subscribe event bus.
//!
//! This crate provides an event bus implementation with features including:
//! - Dot-hierarchical topics with `*` wildcard subscriptions
//! - Optional per-subscription version filtering
//! - Concurrent handler fan-out on a dedicated background worker
//!
//! The bus owns its own single-worker runtime, so events can be dispatched
//! from any thread, including fully synchronous call sites, without the
//! caller bringing its own async machinery.

pub mod error;
pub mod event;
pub mod subscriber;

pub use error::BusError;
pub use event::Event;
pub use event::event_bus::EventBus;
pub use subscriber::Subscriber;
