//! `pilot-types` – shared vocabulary of the Pilot button bridge.
//!
//! Holds the raw button event delivered by the Desk stream, the five derived
//! output signals, the bus event envelope and the workspace-wide error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Physical keys on the robot's Pilot interface that the Desk reports.
///
/// The `Pilot Mode` key is never reported.  Direction keys are only reported
/// while the Pilot is in Desk mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Circle,
    Cross,
    Check,
    Left,
    Right,
    Up,
    Down,
}

impl Button {
    pub const ALL: [Button; 7] = [
        Button::Circle,
        Button::Cross,
        Button::Check,
        Button::Left,
        Button::Right,
        Button::Up,
        Button::Down,
    ];

    /// Key used for this button in Desk event frames.
    pub fn as_str(self) -> &'static str {
        match self {
            Button::Circle => "circle",
            Button::Cross => "cross",
            Button::Check => "check",
            Button::Left => "left",
            Button::Right => "right",
            Button::Up => "up",
            Button::Down => "down",
        }
    }
}

impl std::fmt::Display for Button {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame from the Desk navigation stream.
///
/// A partial mapping of button names to pressed (`true`) or released
/// (`false`).  Keys absent from the frame carry no information.  Unknown keys
/// are kept but never interpreted.  Key order is not preserved and carries no
/// meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ButtonEvent(Map<String, Value>);

impl ButtonEvent {
    /// Reported state of `button`, or `None` when the frame does not mention
    /// it.  A non-boolean value counts as released.
    pub fn state(&self, button: Button) -> Option<bool> {
        self.0
            .get(button.as_str())
            .map(|v| v.as_bool().unwrap_or(false))
    }

    /// `true` only when the frame reports `button` as pressed.
    pub fn is_pressed(&self, button: Button) -> bool {
        self.state(button) == Some(true)
    }
}

/// The five signals republished for every Desk frame.
///
/// `x` follows the up/down keys (down = `+1`, up = `-1`), `y` follows the
/// left/right keys (right = `+1`, left = `-1`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ButtonSignals {
    pub x: f32,
    pub y: f32,
    pub circle: bool,
    pub cross: bool,
    pub check: bool,
}

/// Receiver of decoded Desk frames.
///
/// Registered once when the event stream is opened and invoked on the stream
/// worker, one frame at a time, in arrival order.
pub trait ButtonHandler: Send + 'static {
    fn on_event(&mut self, event: &ButtonEvent);
}

impl<F> ButtonHandler for F
where
    F: FnMut(&ButtonEvent) + Send + 'static,
{
    fn on_event(&mut self, event: &ButtonEvent) {
        self(event)
    }
}

/// Envelope for everything routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. "pilot-middleware::publisher"
    pub source: String,
    /// Fully qualified topic name, e.g. "franka_buttons/x".
    pub topic: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, topic: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            topic: topic.into(),
            payload,
        }
    }
}

/// Message bodies carried by bus events, mirroring `std_msgs` primitives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Float32(f32),
    Bool(bool),
}

impl EventPayload {
    /// ROS message type name used when the payload leaves the process.
    pub fn ros_type(&self) -> &'static str {
        match self {
            EventPayload::Float32(_) => "std_msgs/Float32",
            EventPayload::Bool(_) => "std_msgs/Bool",
        }
    }

    /// The `data` field of the equivalent ROS message.
    pub fn data(&self) -> Value {
        match *self {
            EventPayload::Float32(v) => Value::from(v),
            EventPayload::Bool(v) => Value::Bool(v),
        }
    }
}

/// Error type shared by every crate in the workspace.
#[derive(Error, Debug)]
pub enum PilotError {
    /// The Desk rejected the login request.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// An authenticated Desk request returned a non-success status.
    #[error("Desk request failed: {0}")]
    Connection(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parsing error: {0}")]
    Parsing(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_keys_match_desk_frame_names() {
        let keys: Vec<String> = Button::ALL.iter().map(|b| b.to_string()).collect();
        assert_eq!(keys, ["circle", "cross", "check", "left", "right", "up", "down"]);
    }

    #[test]
    fn event_parses_partial_frame() {
        let ev: ButtonEvent = serde_json::from_str(r#"{"up": true, "circle": false}"#).unwrap();
        assert_eq!(ev.state(Button::Up), Some(true));
        assert_eq!(ev.state(Button::Circle), Some(false));
        assert_eq!(ev.state(Button::Down), None);
        assert!(ev.is_pressed(Button::Up));
        assert!(!ev.is_pressed(Button::Circle));
    }

    #[test]
    fn event_ignores_unknown_keys() {
        let ev: ButtonEvent = serde_json::from_str(r#"{"pilot_mode": true}"#).unwrap();
        assert!(Button::ALL.iter().all(|&b| ev.state(b).is_none()));
        assert_ne!(ev, ButtonEvent::default());
    }

    #[test]
    fn key_order_does_not_matter() {
        let a: ButtonEvent = serde_json::from_str(r#"{"up": true, "down": false, "check": true}"#).unwrap();
        let b: ButtonEvent = serde_json::from_str(r#"{"check": true, "down": false, "up": true}"#).unwrap();
        assert_eq!(a, b);
        for button in Button::ALL {
            assert_eq!(a.state(button), b.state(button));
        }
    }

    #[test]
    fn non_boolean_value_counts_as_released() {
        let ev: ButtonEvent = serde_json::from_str(r#"{"check": 1}"#).unwrap();
        assert_eq!(ev.state(Button::Check), Some(false));
    }

    #[test]
    fn non_object_frame_is_rejected() {
        assert!(serde_json::from_str::<ButtonEvent>("[true]").is_err());
        assert!(serde_json::from_str::<ButtonEvent>("not json").is_err());
    }

    #[test]
    fn closure_is_a_handler() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let mut handler = move |_: &ButtonEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        };
        handler.on_event(&ButtonEvent::default());
        handler.on_event(&ButtonEvent::default());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn payload_data_matches_ros_message() {
        assert_eq!(EventPayload::Float32(-1.0).data(), serde_json::json!(-1.0));
        assert_eq!(EventPayload::Bool(true).data(), serde_json::json!(true));
        assert_eq!(EventPayload::Bool(true).ros_type(), "std_msgs/Bool");
    }

    #[test]
    fn pilot_error_display() {
        let err = PilotError::Auth("wrong password".to_string());
        assert!(err.to_string().contains("Authentication failed"));
        assert!(err.to_string().contains("wrong password"));
    }
}
