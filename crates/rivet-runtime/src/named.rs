//! [`ActionRegistry`] – actions looked up by stable name.
//!
//! Autonomous routines refer to actions by name.  The registry stores a
//! factory per name and builds a fresh, independent [`Action`] on every
//! lookup, so two routines using `"ShootNote"` never share state.
//!
//! Names of the form `RunPath:<path>` resolve to
//! [`run_path`][crate::subsystems::drive::run_path] when nothing is
//! registered under them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::action::{Action, CompositionError};
use crate::subsystems::drive::run_path;

/// Builds a new instance of an action.
pub type ActionFactory = Arc<dyn Fn() -> Result<Action, CompositionError> + Send + Sync>;

/// Prefix that turns a lookup into a path-following request.
pub const RUN_PATH_PREFIX: &str = "RunPath:";

#[derive(Default, Clone)]
pub struct ActionRegistry {
    factories: BTreeMap<String, ActionFactory>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any earlier entry.
    ///
    /// The factory is called once here so a broken composition is reported
    /// at registration rather than mid-match.
    ///
    /// # Errors
    ///
    /// Whatever [`CompositionError`] the factory returns.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Result<Action, CompositionError> + Send + Sync + 'static,
    ) -> Result<(), CompositionError> {
        let name = name.into();
        factory()?;
        if self.factories.insert(name.clone(), Arc::new(factory)).is_some() {
            info!(action = %name, "named action replaced");
        } else {
            debug!(action = %name, "named action registered");
        }
        Ok(())
    }

    /// A fresh instance of the action registered as `name`, renamed to it.
    ///
    /// # Errors
    ///
    /// [`CompositionError::UnknownAction`] when nothing answers to `name`.
    pub fn get(&self, name: &str) -> Result<Action, CompositionError> {
        if let Some(factory) = self.factories.get(name) {
            return factory().map(|a| a.named(name));
        }
        match name.strip_prefix(RUN_PATH_PREFIX) {
            Some(path) if !path.is_empty() => Ok(run_path(path)),
            _ => Err(CompositionError::UnknownAction(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_types::MechanismId;

    use crate::action::ActionState;
    use crate::subsystems::feeder;
    use crate::testing::sim_mechanisms;

    #[test]
    fn lookups_are_independent_instances() {
        let mut registry = ActionRegistry::new();
        registry
            .register("Pause", || Ok(Action::wait_ticks(2)))
            .expect("register");
        let mut m = sim_mechanisms();

        let mut first = registry.get("Pause").expect("first");
        first.start(&mut m);
        first.step(&mut m);
        assert_eq!(first.step(&mut m), ActionState::Finished);

        let second = registry.get("Pause").expect("second");
        assert_eq!(second.state(), ActionState::Idle);
        assert_eq!(second.name(), "Pause");
    }

    #[test]
    fn broken_factory_is_rejected_at_registration() {
        let mut registry = ActionRegistry::new();
        let err = registry.register("Bad", || {
            Action::parallel(vec![feeder::stop(), feeder::set_rpm(1.0)])
        });
        assert!(matches!(err, Err(CompositionError::Conflict { .. })));
        assert!(!registry.contains("Bad"));
    }

    #[test]
    fn unknown_names_error() {
        let registry = ActionRegistry::new();
        assert_eq!(
            registry.get("Nope").unwrap_err(),
            CompositionError::UnknownAction("Nope".to_string())
        );
        assert!(registry.get(RUN_PATH_PREFIX).is_err());
    }

    #[test]
    fn run_path_prefix_builds_path_action() {
        let registry = ActionRegistry::new();
        let action = registry.get("RunPath:Source2").expect("path");
        assert_eq!(action.name(), "RunPath:Source2");
        assert!(action.requirements().contains(&MechanismId::Drive));
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = ActionRegistry::new();
        registry.register("b", || Ok(Action::wait_ticks(1))).expect("b");
        registry.register("a", || Ok(Action::wait_ticks(1))).expect("a");
        assert_eq!(registry.names(), ["a", "b"]);
    }
}
