//! `rivet-middleware` – event routing
//!
//! Carries telemetry, alerts and action lifecycle events from the control
//! loop to whoever is listening, without the loop ever waiting on them.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe [`EventBus`] on Tokio broadcast
//!   channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
