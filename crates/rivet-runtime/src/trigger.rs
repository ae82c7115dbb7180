//! Edge-triggered action bindings.
//!
//! A [`Trigger`] watches a boolean condition (an operator button, a sensor,
//! anything readable from [`Mechanisms`]) once per tick and builds an action
//! when it changes: `on_true` on the rising edge, `on_false` on the falling
//! edge.  A condition that is already true on the first poll counts as a
//! rising edge.

use std::sync::Arc;

use tracing::warn;

use crate::action::{Action, CompositionError};
use crate::named::ActionFactory;
use crate::subsystems::Mechanisms;

pub struct Trigger {
    name: String,
    condition: Box<dyn FnMut(&Mechanisms) -> bool + Send>,
    on_true: Option<ActionFactory>,
    on_false: Option<ActionFactory>,
    last: bool,
}

impl Trigger {
    pub fn new(
        name: impl Into<String>,
        condition: impl FnMut(&Mechanisms) -> bool + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            condition: Box::new(condition),
            on_true: None,
            on_false: None,
            last: false,
        }
    }

    /// Schedule a fresh action from `factory` when the condition becomes true.
    pub fn on_true(
        mut self,
        factory: impl Fn() -> Result<Action, CompositionError> + Send + Sync + 'static,
    ) -> Self {
        self.on_true = Some(Arc::new(factory));
        self
    }

    /// Schedule a fresh action from `factory` when the condition becomes false.
    pub fn on_false(
        mut self,
        factory: impl Fn() -> Result<Action, CompositionError> + Send + Sync + 'static,
    ) -> Self {
        self.on_false = Some(Arc::new(factory));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the condition and return the action for an edge, if any.
    pub fn poll(&mut self, m: &Mechanisms) -> Option<Action> {
        let now = (self.condition)(m);
        let edge = match (self.last, now) {
            (false, true) => self.on_true.as_ref(),
            (true, false) => self.on_false.as_ref(),
            _ => None,
        };
        self.last = now;
        let factory = edge?;
        match factory() {
            Ok(action) => Some(action),
            Err(e) => {
                warn!(trigger = %self.name, error = %e, "bound action could not be built");
                None
            }
        }
    }
}

/// Every trigger bound on the robot, polled in binding order.
#[derive(Default)]
pub struct Triggers(Vec<Trigger>);

impl Triggers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, trigger: Trigger) {
        self.0.push(trigger);
    }

    /// Poll every trigger; returns the actions to schedule, in binding order.
    pub fn poll(&mut self, m: &Mechanisms) -> Vec<Action> {
        self.0.iter_mut().filter_map(|t| t.poll(m)).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
