//! [`Scheduler`] – runs actions against the mechanisms they require.
//!
//! Each mechanism is owned by at most one running action.  Scheduling an
//! action that needs a mechanism already in use interrupts the current
//! owner first; its cleanup runs inside the same
//! [`schedule`][Scheduler::schedule] call, so by the time the new action
//! starts the mechanism is back in a known state.
//!
//! A mechanism may have a default action.  It is started at the end of any
//! [`step`][Scheduler::step] in which every mechanism it requires is free,
//! and returns to its slot whenever it ends.
//!
//! Lifecycle transitions are recorded as `(name, phase)` pairs; drain them
//! with [`take_events`][Scheduler::take_events].

use std::collections::BTreeMap;

use rivet_types::{ActionPhase, MechanismId};
use tracing::{debug, info};

use crate::action::{Action, ActionState, CompositionError};
use crate::subsystems::Mechanisms;

/// Identifies one scheduled run of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionHandle(u64);

struct Scheduled {
    handle: ActionHandle,
    action: Action,
    default_for: Option<MechanismId>,
}

#[derive(Default)]
pub struct Scheduler {
    running: Vec<Scheduled>,
    /// `None` while that mechanism's default is running.
    defaults: BTreeMap<MechanismId, Option<Action>>,
    next_handle: u64,
    events: Vec<(String, ActionPhase)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `action` now, interrupting any running action that shares a
    /// requirement with it.
    pub fn schedule(&mut self, action: Action, m: &mut Mechanisms) -> ActionHandle {
        self.launch(action, None, m)
    }

    /// Step every running action once, retire the ones that finished, then
    /// start defaults for mechanisms left free.
    pub fn step(&mut self, m: &mut Mechanisms) {
        let mut i = 0;
        while i < self.running.len() {
            if self.running[i].action.step(m) == ActionState::Running {
                i += 1;
                continue;
            }
            let done = self.running.remove(i);
            self.retire(done, ActionPhase::Finished);
        }
        self.start_defaults(m);
    }

    /// Make `action` the default for `mechanism`, replacing (and
    /// interrupting) any previous default.
    ///
    /// # Errors
    ///
    /// [`CompositionError::DefaultWithoutRequirement`] when `action` does not
    /// require `mechanism`.
    pub fn set_default(
        &mut self,
        mechanism: MechanismId,
        action: Action,
        m: &mut Mechanisms,
    ) -> Result<(), CompositionError> {
        if !action.requirements().contains(&mechanism) {
            return Err(CompositionError::DefaultWithoutRequirement { mechanism });
        }
        info!(%mechanism, action = action.name(), "default action set");
        self.defaults.insert(mechanism, Some(action));
        if let Some(pos) = self
            .running
            .iter()
            .position(|s| s.default_for == Some(mechanism))
        {
            let mut old = self.running.remove(pos);
            old.action.interrupt(m);
            self.retire(old, ActionPhase::Interrupted);
        }
        Ok(())
    }

    /// Interrupt the action behind `handle`.  Returns `false` when it is no
    /// longer running.
    pub fn cancel(&mut self, handle: ActionHandle, m: &mut Mechanisms) -> bool {
        let Some(pos) = self.running.iter().position(|s| s.handle == handle) else {
            return false;
        };
        let mut cancelled = self.running.remove(pos);
        cancelled.action.interrupt(m);
        self.retire(cancelled, ActionPhase::Interrupted);
        true
    }

    /// Interrupt everything, defaults included.  Defaults restart at the
    /// next [`step`][Self::step].
    pub fn cancel_all(&mut self, m: &mut Mechanisms) {
        for mut s in std::mem::take(&mut self.running) {
            s.action.interrupt(m);
            self.retire(s, ActionPhase::Interrupted);
        }
    }

    pub fn is_running(&self, handle: ActionHandle) -> bool {
        self.running.iter().any(|s| s.handle == handle)
    }

    /// Names of running actions, oldest first.
    pub fn running_names(&self) -> Vec<&str> {
        self.running.iter().map(|s| s.action.name()).collect()
    }

    /// Name of the action that owns `mechanism`, if any.
    pub fn owner(&self, mechanism: MechanismId) -> Option<&str> {
        self.running
            .iter()
            .find(|s| s.action.requirements().contains(&mechanism))
            .map(|s| s.action.name())
    }

    /// Lifecycle transitions since the last call.
    pub fn take_events(&mut self) -> Vec<(String, ActionPhase)> {
        std::mem::take(&mut self.events)
    }

    fn launch(
        &mut self,
        mut action: Action,
        default_for: Option<MechanismId>,
        m: &mut Mechanisms,
    ) -> ActionHandle {
        let mut i = 0;
        while i < self.running.len() {
            let clash = self.running[i]
                .action
                .requirements()
                .iter()
                .any(|r| action.requirements().contains(r));
            if !clash {
                i += 1;
                continue;
            }
            let mut evicted = self.running.remove(i);
            debug!(
                evicted = evicted.action.name(),
                by = action.name(),
                "requirement conflict"
            );
            evicted.action.interrupt(m);
            self.retire(evicted, ActionPhase::Interrupted);
        }

        let handle = ActionHandle(self.next_handle);
        self.next_handle += 1;
        if action.state() != ActionState::Idle {
            action.reset();
        }
        action.start(m);
        debug!(action = action.name(), handle = handle.0, "action started");
        self.events
            .push((action.name().to_string(), ActionPhase::Started));
        self.running.push(Scheduled {
            handle,
            action,
            default_for,
        });
        handle
    }

    fn retire(&mut self, mut done: Scheduled, phase: ActionPhase) {
        debug!(action = done.action.name(), ?phase, "action ended");
        self.events.push((done.action.name().to_string(), phase));
        if let Some(mechanism) = done.default_for {
            done.action.reset();
            // A replaced default finds its slot taken and is dropped.
            if let Some(slot) = self.defaults.get_mut(&mechanism) {
                if slot.is_none() {
                    *slot = Some(done.action);
                }
            }
        }
    }

    fn start_defaults(&mut self, m: &mut Mechanisms) {
        let ready: Vec<MechanismId> = self
            .defaults
            .iter()
            .filter_map(|(mechanism, slot)| {
                let action = slot.as_ref()?;
                let free = action
                    .requirements()
                    .iter()
                    .all(|r| !self.running.iter().any(|s| s.action.requirements().contains(r)));
                free.then_some(*mechanism)
            })
            .collect();
        for mechanism in ready {
            // Re-check: a default started earlier in this loop may have
            // claimed a shared requirement.
            let Some(action) = self.defaults.get_mut(&mechanism).and_then(Option::take) else {
                continue;
            };
            let busy = action
                .requirements()
                .iter()
                .any(|r| self.running.iter().any(|s| s.action.requirements().contains(r)));
            if busy {
                self.defaults.insert(mechanism, Some(action));
                continue;
            }
            self.launch(action, Some(mechanism), m);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use rivet_types::ChannelRequest;

    use crate::subsystems::{Feeder, Shooter, feeder, shooter};
    use crate::testing::sim_mechanisms;

    fn names(events: &[(String, ActionPhase)]) -> Vec<String> {
        events.iter().map(|(n, p)| format!("{n}:{p:?}")).collect()
    }

    #[test]
    fn conflicting_schedule_interrupts_with_cleanup_first() {
        let mut m = sim_mechanisms();
        let mut s = Scheduler::new();
        let spin = shooter::set_rpm(3000.0, 1.0)
            .finally_do(|m, interrupted| {
                if interrupted {
                    m.shooter.request_stop();
                }
            })
            .named("spin");
        let first = s.schedule(spin, &mut m);
        s.step(&mut m);

        let second = s.schedule(shooter::set_left_voltage(2.0).named("manual"), &mut m);
        assert!(!s.is_running(first));
        assert!(s.is_running(second));
        // Cleanup ran synchronously: the right wheel was stopped and nothing
        // has driven it since.
        assert_eq!(
            m.shooter.controller().request(Shooter::RIGHT),
            Some(ChannelRequest::Voltage(0.0))
        );
        assert_eq!(
            names(&s.take_events()),
            ["spin:Started", "spin:Interrupted", "manual:Started"]
        );
    }

    #[test]
    fn disjoint_actions_run_together() {
        let mut m = sim_mechanisms();
        let mut s = Scheduler::new();
        let a = s.schedule(shooter::set_rpm(1000.0, 1.0), &mut m);
        let b = s.schedule(feeder::set_rpm(1000.0), &mut m);
        s.step(&mut m);
        assert!(s.is_running(a) && s.is_running(b));
        assert_eq!(s.owner(MechanismId::Feeder), Some("Feeder.set_rpm"));
        assert_eq!(s.running_names(), ["Shooter.set_rpm", "Feeder.set_rpm"]);
    }

    #[test]
    fn finished_actions_are_retired() {
        let mut m = sim_mechanisms();
        let mut s = Scheduler::new();
        let h = s.schedule(Action::wait_ticks(2).named("pause"), &mut m);
        s.step(&mut m);
        assert!(s.is_running(h));
        s.step(&mut m);
        assert!(!s.is_running(h));
        assert_eq!(names(&s.take_events()), ["pause:Started", "pause:Finished"]);
        assert!(s.take_events().is_empty());
    }

    #[test]
    fn default_yields_and_returns() {
        let mut m = sim_mechanisms();
        let mut s = Scheduler::new();
        s.set_default(MechanismId::Feeder, feeder::stop().named("idle"), &mut m)
            .expect("default");
        s.step(&mut m);
        assert_eq!(s.owner(MechanismId::Feeder), Some("idle"));

        let burst = Action::run("burst", [MechanismId::Feeder], |m| m.feeder.request_rpm(500.0))
            .until({
                let mut n = 0;
                move |_: &Mechanisms| {
                    n += 1;
                    n >= 2
                }
            });
        s.schedule(burst, &mut m);
        assert_eq!(s.owner(MechanismId::Feeder), Some("burst"));
        s.step(&mut m);
        s.step(&mut m);
        // Burst finished in that step; the default is back.
        assert_eq!(s.owner(MechanismId::Feeder), Some("idle"));
        s.step(&mut m);
        assert_eq!(
            m.feeder.controller().request(Feeder::ROLLER),
            Some(ChannelRequest::Voltage(0.0))
        );
    }

    #[test]
    fn default_must_require_its_mechanism() {
        let mut m = sim_mechanisms();
        let mut s = Scheduler::new();
        assert_eq!(
            s.set_default(MechanismId::Pivot, feeder::stop(), &mut m),
            Err(CompositionError::DefaultWithoutRequirement {
                mechanism: MechanismId::Pivot
            })
        );
    }

    #[test]
    fn replacing_a_running_default_interrupts_it() {
        let mut m = sim_mechanisms();
        let mut s = Scheduler::new();
        s.set_default(MechanismId::Feeder, feeder::stop().named("old"), &mut m)
            .expect("default");
        s.step(&mut m);
        s.set_default(MechanismId::Feeder, feeder::set_rpm(100.0).named("new"), &mut m)
            .expect("default");
        assert_eq!(s.owner(MechanismId::Feeder), None);
        s.step(&mut m);
        assert_eq!(s.owner(MechanismId::Feeder), Some("new"));
    }

    #[test]
    fn cancel_runs_cleanup_once() {
        let mut m = sim_mechanisms();
        let mut s = Scheduler::new();
        let ends = Arc::new(Mutex::new(Vec::new()));
        let log = ends.clone();
        let h = s.schedule(
            feeder::set_rpm(2000.0).finally_do(move |_, interrupted| {
                if let Ok(mut l) = log.lock() {
                    l.push(interrupted);
                }
            }),
            &mut m,
        );
        assert!(s.cancel(h, &mut m));
        assert!(!s.cancel(h, &mut m));
        assert_eq!(*ends.lock().expect("ends"), [true]);
    }

    #[test]
    fn cancel_all_clears_everything() {
        let mut m = sim_mechanisms();
        let mut s = Scheduler::new();
        s.schedule(shooter::stop(), &mut m);
        s.schedule(feeder::stop(), &mut m);
        s.cancel_all(&mut m);
        assert!(s.running_names().is_empty());
        let events = s.take_events();
        assert_eq!(
            events.iter().filter(|(_, p)| *p == ActionPhase::Interrupted).count(),
            2
        );
    }
}
