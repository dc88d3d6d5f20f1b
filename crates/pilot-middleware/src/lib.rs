//! `pilot-middleware` – signal routing for the Pilot button bridge.
//!
//! Turns decoded Desk frames into typed topic messages and carries them to
//! downstream consumers without caring what the robot does with them.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels, one lane per output signal.
//! - [`publisher`] – Stateless frame decoder plus the [`ButtonPublisher`]
//!   handler that republishes the five signals on the bus.
//! - [`rosbridge`] – rosbridge-compatible WebSocket server that forwards bus
//!   traffic to external subscribers.

pub mod bus;
pub mod publisher;
pub mod rosbridge;

pub use bus::{DEFAULT_TOPIC_PREFIX, EventBus, Topic, TopicReceiver};
pub use publisher::{ButtonPublisher, decode};
pub use rosbridge::RosbridgeServer;
