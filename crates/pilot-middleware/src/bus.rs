//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! One [`Topic`] lane exists per republished Pilot signal:
//!
//! | Topic | Message | Meaning |
//! |---|---|---|
//! | [`Topic::X`] | `std_msgs/Float32` | `+1` down, `-1` up, `0` otherwise |
//! | [`Topic::Y`] | `std_msgs/Float32` | `+1` right, `-1` left, `0` otherwise |
//! | [`Topic::Circle`] | `std_msgs/Bool` | circle key pressed |
//! | [`Topic::Cross`] | `std_msgs/Bool` | cross key pressed |
//! | [`Topic::Check`] | `std_msgs/Bool` | check key pressed |
//!
//! Every event published to a topic lane is mirrored onto a global channel so
//! that fan-out consumers (the rosbridge server) see all traffic in order.

use pilot_types::{Event, PilotError};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Topic namespace used when none is configured.
pub const DEFAULT_TOPIC_PREFIX: &str = "franka_buttons";

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    X,
    Y,
    Circle,
    Cross,
    Check,
}

impl Topic {
    pub const ALL: [Topic; 5] = [Topic::X, Topic::Y, Topic::Circle, Topic::Cross, Topic::Check];

    /// Last path segment of the topic name.
    pub fn suffix(self) -> &'static str {
        match self {
            Topic::X => "x",
            Topic::Y => "y",
            Topic::Circle => "circle",
            Topic::Cross => "cross",
            Topic::Check => "check",
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    prefix: String,
    // Mirror of every topic lane
    sender: broadcast::Sender<Event>,
    // Per-topic channels
    x: broadcast::Sender<Event>,
    y: broadcast::Sender<Event>,
    circle: broadcast::Sender<Event>,
    cross: broadcast::Sender<Event>,
    check: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity whose topic names
    /// live under `prefix` (e.g. `"franka_buttons"` → `"franka_buttons/x"`).
    ///
    /// The `capacity` is applied to every channel independently.
    pub fn new(capacity: usize, prefix: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (x, _) = broadcast::channel(capacity);
        let (y, _) = broadcast::channel(capacity);
        let (circle, _) = broadcast::channel(capacity);
        let (cross, _) = broadcast::channel(capacity);
        let (check, _) = broadcast::channel(capacity);
        Self {
            prefix: prefix.into().trim_matches('/').to_string(),
            sender,
            x,
            y,
            circle,
            cross,
            check,
        }
    }

    /// Fully qualified name of `topic`, without a leading slash.
    pub fn topic_name(&self, topic: Topic) -> String {
        if self.prefix.is_empty() {
            topic.suffix().to_string()
        } else {
            format!("{}/{}", self.prefix, topic.suffix())
        }
    }

    // -----------------------------------------------------------------------
    // Topic-based API
    // -----------------------------------------------------------------------

    /// Publish `event` to the given [`Topic`] channel and mirror it onto the
    /// global channel.
    ///
    /// Returns the number of receivers that were handed the event across both
    /// channels, or [`PilotError::Channel`] when nobody is listening on
    /// either.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, PilotError> {
        let on_topic = self.topic_sender(topic).send(event.clone()).unwrap_or(0);
        let on_global = self.sender.send(event).unwrap_or(0);
        match on_topic + on_global {
            0 => Err(PilotError::Channel(format!("No subscribers for topic {:?}", topic))),
            n => Ok(n),
        }
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to every event published on any topic.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::X => &self.x,
            Topic::Y => &self.y,
            Topic::Circle => &self.circle,
            Topic::Cross => &self.cross,
            Topic::Check => &self.check,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TOPIC_PREFIX)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_types::EventPayload;

    fn make_event(bus: &EventBus, topic: Topic, payload: EventPayload) -> Event {
        Event::new("pilot-middleware::test", bus.topic_name(topic), payload)
    }

    #[test]
    fn topic_names_use_prefix() {
        let bus = EventBus::default();
        assert_eq!(bus.topic_name(Topic::X), "franka_buttons/x");
        assert_eq!(bus.topic_name(Topic::Check), "franka_buttons/check");

        let bus = EventBus::new(8, "/panda/buttons/");
        assert_eq!(bus.topic_name(Topic::Circle), "panda/buttons/circle");

        let bus = EventBus::new(8, "");
        assert_eq!(bus.topic_name(Topic::Y), "y");
    }

    #[test]
    fn publish_no_subscribers_returns_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::X, make_event(&bus, Topic::X, EventPayload::Float32(1.0)));
        assert!(matches!(result, Err(PilotError::Channel(_))));
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::Circle);
        let mut subscriber2 = bus.subscribe_to(Topic::Circle);

        let event = make_event(&bus, Topic::Circle, EventPayload::Bool(true));
        let delivered = bus.publish_to(Topic::Circle, event.clone())?;
        assert_eq!(delivered, 2);

        assert_eq!(subscriber1.recv().await?.id, event.id);
        assert_eq!(subscriber2.recv().await?.id, event.id);
        Ok(())
    }

    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut check_sub = bus.subscribe_to(Topic::Check);
        let _cross_sub = bus.subscribe_to(Topic::Cross);

        bus.publish_to(Topic::Cross, make_event(&bus, Topic::Cross, EventPayload::Bool(true)))?;

        let result = tokio::time::timeout(std::time::Duration::from_millis(50), check_sub.recv()).await;
        assert!(result.is_err(), "Check subscriber must not receive a Cross event");
        Ok(())
    }

    #[tokio::test]
    async fn global_subscriber_sees_every_topic_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut all = bus.subscribe();

        for topic in Topic::ALL {
            bus.publish_to(topic, make_event(&bus, topic, EventPayload::Bool(false)))?;
        }

        for topic in Topic::ALL {
            assert_eq!(all.recv().await?.topic, bus.topic_name(topic));
        }
        Ok(())
    }

    /// Flooding a low-capacity channel while a subscriber sleeps must produce
    /// a `Lagged` error rather than panicking or blocking.
    #[tokio::test]
    async fn topic_channel_lag_on_slow_subscriber() {
        let bus = EventBus::new(16, DEFAULT_TOPIC_PREFIX);
        let mut slow_sub = bus.subscribe_to(Topic::X);

        for _ in 0..1_000 {
            let _ = bus.publish_to(Topic::X, make_event(&bus, Topic::X, EventPayload::Float32(0.0)));
        }

        let result = slow_sub.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }
}
