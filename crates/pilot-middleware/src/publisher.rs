//! Pilot button decoder and publisher.
//!
//! [`decode`] turns one Desk frame into the five [`ButtonSignals`];
//! [`ButtonPublisher`] republishes them on the [`EventBus`], one topic per
//! signal, for every frame it is handed.
//!
//! Decoding is stateless: a frame is never merged with earlier frames, so a
//! release that was never preceded by a press is perfectly valid input.

use std::sync::Arc;

use pilot_types::{Button, ButtonEvent, ButtonHandler, ButtonSignals, Event, EventPayload};
use tracing::trace;

use crate::bus::{EventBus, Topic};

const SOURCE: &str = "pilot-middleware::publisher";

/// Derive the output signals from a single frame.
///
/// Only keys present and `true` in `event` contribute.  When opposite
/// direction keys are both pressed in one frame, `down` wins over `up` and
/// `right` wins over `left`, independent of their order in the frame.
pub fn decode(event: &ButtonEvent) -> ButtonSignals {
    let axis = |positive: Button, negative: Button| {
        if event.is_pressed(positive) {
            1.0
        } else if event.is_pressed(negative) {
            -1.0
        } else {
            0.0
        }
    };

    ButtonSignals {
        x: axis(Button::Down, Button::Up),
        y: axis(Button::Right, Button::Left),
        circle: event.is_pressed(Button::Circle),
        cross: event.is_pressed(Button::Cross),
        check: event.is_pressed(Button::Check),
    }
}

/// Republishes decoded Pilot frames on the internal [`EventBus`].
#[derive(Clone)]
pub struct ButtonPublisher {
    bus: Arc<EventBus>,
}

impl ButtonPublisher {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Decode `event` and publish all five signals, unchanged values
    /// included.
    ///
    /// Never fails: a topic without subscribers is a normal condition for a
    /// fire-and-forget publisher.
    pub fn publish(&self, event: &ButtonEvent) -> ButtonSignals {
        let signals = decode(event);
        let outputs = [
            (Topic::X, EventPayload::Float32(signals.x)),
            (Topic::Y, EventPayload::Float32(signals.y)),
            (Topic::Circle, EventPayload::Bool(signals.circle)),
            (Topic::Cross, EventPayload::Bool(signals.cross)),
            (Topic::Check, EventPayload::Bool(signals.check)),
        ];
        for (topic, payload) in outputs {
            let event = Event::new(SOURCE, self.bus.topic_name(topic), payload);
            if let Err(e) = self.bus.publish_to(topic, event) {
                trace!(?topic, error = %e, "signal dropped");
            }
        }
        signals
    }
}

impl ButtonHandler for ButtonPublisher {
    fn on_event(&mut self, event: &ButtonEvent) {
        self.publish(event);
    }
}
