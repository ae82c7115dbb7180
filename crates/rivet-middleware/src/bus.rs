//! Typed, topic-based publish/subscribe event bus.
//!
//! Built on [`tokio::sync::broadcast`]: every subscriber receives every
//! message on its topic, and a slow subscriber only ever hurts itself (it
//! sees [`RecvError::Lagged`][broadcast::error::RecvError::Lagged]).
//! Publishing never blocks and never waits for a consumer, so the control
//! loop can publish from inside a tick.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Telemetry`] | One [`MechanismTelemetry`][rivet_types::MechanismTelemetry] per mechanism per tick |
//! | [`Topic::SystemAlerts`] | Hardware faults, interlock engage/release edges |
//! | [`Topic::Actions`] | Action started / finished / interrupted |

use std::num::NonZeroUsize;

use rivet_types::{Event, RivetError};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(256).unwrap();

/// Routing lanes on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Per-tick mechanism state.
    Telemetry,
    /// Faults and safety interventions.
    SystemAlerts,
    /// Action lifecycle transitions.
    Actions,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Telemetry, Topic::SystemAlerts, Topic::Actions];
}

/// Shared event bus.  Clones share the same underlying channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    telemetry: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
    actions: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus whose every topic buffers `capacity` events.
    ///
    /// # Errors
    ///
    /// [`RivetError::Channel`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, RivetError> {
        NonZeroUsize::new(capacity)
            .map(Self::with_capacity)
            .ok_or_else(|| RivetError::Channel("bus capacity must be positive".into()))
    }

    fn with_capacity(capacity: NonZeroUsize) -> Self {
        let (telemetry, _) = broadcast::channel(capacity.get());
        let (system_alerts, _) = broadcast::channel(capacity.get());
        let (actions, _) = broadcast::channel(capacity.get());
        Self {
            telemetry,
            system_alerts,
            actions,
        }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of subscribers handed the event.  Having nobody
    /// listening is normal and yields `0`.
    pub fn publish_to(&self, topic: Topic, event: Event) -> usize {
        match self.topic_sender(topic).send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(_)) => {
                trace!(?topic, "no subscribers; event dropped");
                0
            }
        }
    }

    /// Subscribe to `topic`.  Only events published after this call are seen.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Current number of subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::SystemAlerts => &self.system_alerts,
            Topic::Actions => &self.actions,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single [`Topic`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// * `Err(RecvError::Lagged(n))` – `n` messages were dropped because this
    ///   subscriber fell behind.
    /// * `Err(RecvError::Closed)` – every sender is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Everything buffered right now, without waiting.  Lag is logged and
    /// skipped over.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "subscriber lagged");
                }
                Err(_) => break,
            }
        }
        events
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_types::{ActionPhase, EventPayload};

    fn make_event(name: &str) -> Event {
        Event::new(
            "rivet-middleware::test",
            EventPayload::ActionLifecycle {
                name: name.to_string(),
                phase: ActionPhase::Started,
            },
        )
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        for topic in Topic::ALL {
            assert_eq!(bus.publish_to(topic, make_event("x")), 0);
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(EventBus::new(0).is_err());
        assert!(EventBus::new(4).is_ok());
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut sub1 = bus.subscribe_to(Topic::Actions);
        let mut sub2 = bus.subscribe_to(Topic::Actions);
        assert_eq!(bus.subscriber_count(Topic::Actions), 2);

        let event = make_event("ShootNote");
        assert_eq!(bus.publish_to(Topic::Actions, event.clone()), 2);

        assert_eq!(sub1.recv().await?.id, event.id);
        assert_eq!(sub2.recv().await?.id, event.id);
        Ok(())
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        let _telemetry = bus.subscribe_to(Topic::Telemetry);

        bus.publish_to(Topic::Telemetry, make_event("x"));

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), alerts.recv()).await;
        assert!(result.is_err(), "SystemAlerts must not see Telemetry traffic");
    }

    #[test]
    fn drain_returns_buffered_events_in_order() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe_to(Topic::Telemetry);
        bus.publish_to(Topic::Telemetry, make_event("a"));
        bus.publish_to(Topic::Telemetry, make_event("b"));

        let names: Vec<String> = sub
            .drain()
            .into_iter()
            .filter_map(|e| match e.payload {
                EventPayload::ActionLifecycle { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert!(sub.drain().is_empty());
        assert_eq!(sub.topic(), Topic::Telemetry);
    }

    #[test]
    fn slow_subscriber_lags_without_blocking_publisher() {
        let bus = EventBus::new(8).expect("bus");
        let mut slow = bus.subscribe_to(Topic::Telemetry);
        for _ in 0..100 {
            bus.publish_to(Topic::Telemetry, make_event("flood"));
        }
        // Only the newest `capacity` events survive.
        assert_eq!(slow.drain().len(), 8);
    }

    #[test]
    fn default_bus_buffers_default_capacity() {
        let bus = EventBus::default();
        let mut slow = bus.subscribe_to(Topic::SystemAlerts);
        for _ in 0..DEFAULT_CAPACITY.get() + 10 {
            bus.publish_to(Topic::SystemAlerts, make_event("flood"));
        }
        assert_eq!(slow.drain().len(), DEFAULT_CAPACITY.get());
    }
}
