//! Action Composer.
//!
//! An [`Action`] is a unit of control-loop work over one or more mechanisms.
//! Actions never block: each is stepped once per tick with `&mut`
//! [`Mechanisms`] and reports whether it is still running.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start──▶ Running ──finish──▶ Finished
//!                    │
//!                    └──interrupt──▶ Interrupted
//! ```
//!
//! `Finished` and `Interrupted` are terminal until [`Action::reset`].  The
//! end hook (see [`Action::finally_do`]) runs exactly once on either exit,
//! in the same tick, and receives `interrupted`.
//!
//! # Composites
//!
//! | Constructor | Finishes when |
//! |---|---|
//! | [`Action::sequence`] | the last child finishes; child *n+1* starts the tick child *n* finishes |
//! | [`Action::parallel`] | **any** child finishes; the rest are interrupted |
//! | [`Action::deadline`] | the first (deadline) child finishes; the rest are interrupted |
//! | [`Action::join`] | every child has finished |
//! | [`Action::until`] | the inner action finishes, or the condition holds (inner interrupted) |
//! | [`Action::wait_ticks`] | `n` steps have elapsed |
//!
//! Children are always stepped in declaration order.  In a parallel group
//! the first child to finish wins and the children after it are not
//! stepped that tick.  An `until` condition is checked after the inner
//! action has stepped.
//!
//! Concurrent groups reject children with overlapping requirements, and
//! every group rejects an empty child list ([`CompositionError`]).
//!
//! # Example
//!
//! ```rust,ignore
//! let shoot = Action::parallel(vec![
//!     shooter::set_rpm(5800.0, 0.3),
//!     Action::wait_ticks(50).then(feeder::set_rpm(2000.0)),
//! ])?
//! .until(|m| !m.feeder.feeder_beambreak_obstructed() && !m.feeder.shooter_beambreak_obstructed());
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use rivet_types::MechanismId;
use thiserror::Error;

use crate::subsystems::Mechanisms;

/// Per-tick body of an action.
pub type StepFn = Box<dyn FnMut(&mut Mechanisms) + Send>;
/// Read-only check against this tick's mechanism state.
pub type Condition = Box<dyn FnMut(&Mechanisms) -> bool + Send>;
/// Cleanup, called with `interrupted`.
pub type EndFn = Box<dyn FnMut(&mut Mechanisms, bool) + Send>;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// An action graph that cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    #[error("{group} group has no children")]
    Empty { group: &'static str },

    #[error("{group} group has more than one child requiring {mechanism}")]
    Conflict {
        group: &'static str,
        mechanism: MechanismId,
    },

    #[error("default action for {mechanism} does not require it")]
    DefaultWithoutRequirement { mechanism: MechanismId },

    #[error("no action registered as '{0}'")]
    UnknownAction(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Idle,
    Running,
    Finished,
    Interrupted,
}

impl ActionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionState::Finished | ActionState::Interrupted)
    }
}

enum ActionKind {
    Run {
        step: Option<StepFn>,
        finish: Option<Condition>,
    },
    Wait {
        ticks: u64,
        elapsed: u64,
    },
    Sequence {
        children: Vec<Action>,
        index: usize,
    },
    Parallel {
        children: Vec<Action>,
    },
    /// `children[0]` is the deadline.
    Deadline {
        children: Vec<Action>,
    },
    Join {
        children: Vec<Action>,
    },
    Until {
        inner: Box<Action>,
        condition: Condition,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Action
// ─────────────────────────────────────────────────────────────────────────────

/// A composable, interruptible unit of work.
pub struct Action {
    name: String,
    requirements: BTreeSet<MechanismId>,
    state: ActionState,
    kind: ActionKind,
    on_start: Option<StepFn>,
    on_end: Option<EndFn>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("requirements", &self.requirements)
            .finish_non_exhaustive()
    }
}

impl Action {
    fn with_kind(
        name: impl Into<String>,
        requirements: BTreeSet<MechanismId>,
        kind: ActionKind,
    ) -> Self {
        Self {
            name: name.into(),
            requirements,
            state: ActionState::Idle,
            kind,
            on_start: None,
            on_end: None,
        }
    }

    // ── Leaves ──────────────────────────────────────────────────────────────

    /// Call `step` every tick until interrupted.
    pub fn run(
        name: impl Into<String>,
        requirements: impl IntoIterator<Item = MechanismId>,
        step: impl FnMut(&mut Mechanisms) + Send + 'static,
    ) -> Self {
        Self::with_kind(
            name,
            requirements.into_iter().collect(),
            ActionKind::Run {
                step: Some(Box::new(step)),
                finish: None,
            },
        )
    }

    /// Call `step` once and finish in the same tick.
    pub fn instant(
        name: impl Into<String>,
        requirements: impl IntoIterator<Item = MechanismId>,
        step: impl FnMut(&mut Mechanisms) + Send + 'static,
    ) -> Self {
        Self::with_kind(
            name,
            requirements.into_iter().collect(),
            ActionKind::Run {
                step: Some(Box::new(step)),
                finish: Some(Box::new(|_: &Mechanisms| true)),
            },
        )
    }

    /// Do nothing until `condition` holds.
    pub fn wait_until(condition: impl FnMut(&Mechanisms) -> bool + Send + 'static) -> Self {
        Self::with_kind(
            "WaitUntil",
            BTreeSet::new(),
            ActionKind::Run {
                step: None,
                finish: Some(Box::new(condition)),
            },
        )
    }

    /// Finish on the `ticks`-th step.  `wait_ticks(1)` finishes on its first
    /// step.
    pub fn wait_ticks(ticks: u64) -> Self {
        Self::with_kind("Wait", BTreeSet::new(), ActionKind::Wait { ticks, elapsed: 0 })
    }

    /// Wait at least `duration`, counted in whole ticks of `period`.
    pub fn wait(duration: Duration, period: Duration) -> Self {
        let period = period.as_nanos();
        let ticks = if period == 0 {
            0
        } else {
            duration.as_nanos().div_ceil(period)
        };
        Self::wait_ticks(u64::try_from(ticks).unwrap_or(u64::MAX))
    }

    // ── Groups ──────────────────────────────────────────────────────────────

    /// Run `children` one after another.
    pub fn sequence(children: Vec<Action>) -> Result<Self, CompositionError> {
        if children.is_empty() {
            return Err(CompositionError::Empty { group: "Sequence" });
        }
        let requirements = children
            .iter()
            .flat_map(|c| c.requirements.iter().copied())
            .collect();
        Ok(Self::with_kind(
            "Sequence",
            requirements,
            ActionKind::Sequence { children, index: 0 },
        ))
    }

    /// Run `children` together until the first one finishes.
    pub fn parallel(children: Vec<Action>) -> Result<Self, CompositionError> {
        let requirements = disjoint("Parallel", &children)?;
        Ok(Self::with_kind("Parallel", requirements, ActionKind::Parallel { children }))
    }

    /// Run `others` alongside `deadline` until `deadline` finishes.
    pub fn deadline(deadline: Action, others: Vec<Action>) -> Result<Self, CompositionError> {
        let mut children = Vec::with_capacity(others.len() + 1);
        children.push(deadline);
        children.extend(others);
        let requirements = disjoint("Deadline", &children)?;
        Ok(Self::with_kind("Deadline", requirements, ActionKind::Deadline { children }))
    }

    /// Run `children` together until all of them have finished.
    pub fn join(children: Vec<Action>) -> Result<Self, CompositionError> {
        let requirements = disjoint("Join", &children)?;
        Ok(Self::with_kind("Join", requirements, ActionKind::Join { children }))
    }

    // ── Decorators ──────────────────────────────────────────────────────────

    /// Also finish (interrupting this action) once `condition` holds.
    pub fn until(self, condition: impl FnMut(&Mechanisms) -> bool + Send + 'static) -> Self {
        let name = self.name.clone();
        let requirements = self.requirements.clone();
        Self::with_kind(
            name,
            requirements,
            ActionKind::Until {
                inner: Box::new(self),
                condition: Box::new(condition),
            },
        )
    }

    /// Run `next` after this action finishes.
    pub fn then(self, next: Action) -> Self {
        let requirements = self
            .requirements
            .iter()
            .chain(next.requirements.iter())
            .copied()
            .collect();
        Self::with_kind(
            "Sequence",
            requirements,
            ActionKind::Sequence {
                children: vec![self, next],
                index: 0,
            },
        )
    }

    /// Run `f` when the action starts, before its first step.
    pub fn on_start(mut self, mut f: impl FnMut(&mut Mechanisms) + Send + 'static) -> Self {
        self.on_start = Some(match self.on_start.take() {
            Some(mut prev) => Box::new(move |m: &mut Mechanisms| {
                prev(m);
                f(m);
            }),
            None => Box::new(f),
        });
        self
    }

    /// Run `f` once when the action ends, whether it finished or was
    /// interrupted.
    pub fn finally_do(mut self, mut f: impl FnMut(&mut Mechanisms, bool) + Send + 'static) -> Self {
        self.on_end = Some(match self.on_end.take() {
            Some(mut prev) => Box::new(move |m: &mut Mechanisms, interrupted: bool| {
                prev(m, interrupted);
                f(m, interrupted);
            }),
            None => Box::new(f),
        });
        self
    }

    /// Rename the action.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requirements(&self) -> &BTreeSet<MechanismId> {
        &self.requirements
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ActionState::Running
    }

    // ── Execution ───────────────────────────────────────────────────────────

    /// Enter `Running` and run start hooks, starting children as the
    /// composition rule says.
    pub fn start(&mut self, m: &mut Mechanisms) {
        self.state = ActionState::Running;
        if let Some(f) = self.on_start.as_mut() {
            f(m);
        }
        match &mut self.kind {
            ActionKind::Run { .. } => {}
            ActionKind::Wait { elapsed, .. } => *elapsed = 0,
            ActionKind::Sequence { children, index } => {
                *index = 0;
                if let Some(first) = children.first_mut() {
                    first.start(m);
                }
            }
            ActionKind::Parallel { children }
            | ActionKind::Deadline { children }
            | ActionKind::Join { children } => {
                for child in children {
                    child.start(m);
                }
            }
            ActionKind::Until { inner, .. } => inner.start(m),
        }
    }

    /// Advance one tick.  When the action finishes its end hook runs before
    /// this returns.  Stepping an action that is not running does nothing.
    pub fn step(&mut self, m: &mut Mechanisms) -> ActionState {
        if self.state == ActionState::Running && self.execute(m) {
            self.end(m, false);
        }
        self.state
    }

    /// Interrupt a running action, cascading to its running children.
    pub fn interrupt(&mut self, m: &mut Mechanisms) {
        if self.state == ActionState::Running {
            self.end(m, true);
        }
    }

    /// Return to `Idle` so the action can be started again.
    ///
    /// Resetting a running action skips its end hook; interrupt it first.
    pub fn reset(&mut self) {
        self.state = ActionState::Idle;
        match &mut self.kind {
            ActionKind::Run { .. } => {}
            ActionKind::Wait { elapsed, .. } => *elapsed = 0,
            ActionKind::Sequence { children, index } => {
                *index = 0;
                children.iter_mut().for_each(Action::reset);
            }
            ActionKind::Parallel { children }
            | ActionKind::Deadline { children }
            | ActionKind::Join { children } => children.iter_mut().for_each(Action::reset),
            ActionKind::Until { inner, .. } => inner.reset(),
        }
    }

    /// One tick of work.  Returns `true` when the action is done.
    fn execute(&mut self, m: &mut Mechanisms) -> bool {
        match &mut self.kind {
            ActionKind::Run { step, finish } => {
                if let Some(step) = step.as_mut() {
                    step(m);
                }
                finish.as_mut().is_some_and(|done| done(m))
            }
            ActionKind::Wait { ticks, elapsed } => {
                *elapsed += 1;
                *elapsed >= *ticks
            }
            ActionKind::Sequence { children, index } => {
                let Some(current) = children.get_mut(*index) else {
                    return true;
                };
                if current.step(m) == ActionState::Running {
                    return false;
                }
                *index += 1;
                match children.get_mut(*index) {
                    Some(next) => {
                        next.start(m);
                        false
                    }
                    None => true,
                }
            }
            ActionKind::Parallel { children } => {
                let winner = children
                    .iter_mut()
                    .any(|child| child.step(m) != ActionState::Running);
                if winner {
                    interrupt_all(children, m);
                }
                winner
            }
            ActionKind::Deadline { children } => {
                for child in children.iter_mut() {
                    child.step(m);
                }
                let done = children.first().is_some_and(|d| !d.is_running());
                if done {
                    interrupt_all(children, m);
                }
                done
            }
            ActionKind::Join { children } => {
                for child in children.iter_mut() {
                    child.step(m);
                }
                children.iter().all(|c| !c.is_running())
            }
            ActionKind::Until { inner, condition } => {
                if inner.step(m) != ActionState::Running {
                    return true;
                }
                if condition(m) {
                    inner.interrupt(m);
                    return true;
                }
                false
            }
        }
    }

    fn end(&mut self, m: &mut Mechanisms, interrupted: bool) {
        if interrupted {
            match &mut self.kind {
                ActionKind::Sequence { children, .. }
                | ActionKind::Parallel { children }
                | ActionKind::Deadline { children }
                | ActionKind::Join { children } => interrupt_all(children, m),
                ActionKind::Until { inner, .. } => inner.interrupt(m),
                ActionKind::Run { .. } | ActionKind::Wait { .. } => {}
            }
        }
        self.state = if interrupted {
            ActionState::Interrupted
        } else {
            ActionState::Finished
        };
        if let Some(f) = self.on_end.as_mut() {
            f(m, interrupted);
        }
    }
}

/// Interrupt every child still running.
fn interrupt_all(children: &mut [Action], m: &mut Mechanisms) {
    for child in children {
        child.interrupt(m);
    }
}

/// Union of `children`'s requirements, rejecting empty or overlapping sets.
fn disjoint(
    group: &'static str,
    children: &[Action],
) -> Result<BTreeSet<MechanismId>, CompositionError> {
    if children.is_empty() {
        return Err(CompositionError::Empty { group });
    }
    let mut seen = BTreeSet::new();
    for child in children {
        for mechanism in &child.requirements {
            if !seen.insert(*mechanism) {
                return Err(CompositionError::Conflict {
                    group,
                    mechanism: *mechanism,
                });
            }
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use rivet_types::{ChannelId, ChannelRequest};

    use crate::subsystems::feeder::Feeder;
    use crate::testing::sim_mechanisms;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn record(trace: &Trace, entry: impl Into<String>) {
        if let Ok(mut t) = trace.lock() {
            t.push(entry.into());
        }
    }

    fn entries(trace: &Trace) -> Vec<String> {
        trace.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Leaf that logs steps and finishes on step `finish_on` (never if 0).
    fn traced(trace: &Trace, name: &'static str, finish_on: u32) -> Action {
        let steps = Arc::new(Mutex::new(0u32));
        let (t1, t2, t3) = (trace.clone(), trace.clone(), trace.clone());
        let counter = steps.clone();
        Action::with_kind(
            name,
            BTreeSet::new(),
            ActionKind::Run {
                step: Some(Box::new(move |_: &mut Mechanisms| {
                    if let Ok(mut n) = counter.lock() {
                        *n += 1;
                    }
                    record(&t1, format!("{name}:step"));
                })),
                finish: Some(Box::new(move |_: &Mechanisms| {
                    finish_on != 0 && steps.lock().map(|n| *n >= finish_on).unwrap_or(false)
                })),
            },
        )
        .on_start(move |_| record(&t2, format!("{name}:start")))
        .finally_do(move |_, interrupted| {
            record(&t3, format!("{name}:{}", if interrupted { "interrupted" } else { "finished" }))
        })
    }

    fn run_until_done(action: &mut Action, m: &mut Mechanisms, max_ticks: u32) -> u32 {
        action.start(m);
        for tick in 1..=max_ticks {
            if action.step(m).is_terminal() {
                return tick;
            }
        }
        max_ticks + 1
    }

    #[test]
    fn wait_ticks_counts_whole_ticks() {
        let mut m = sim_mechanisms();
        assert_eq!(run_until_done(&mut Action::wait_ticks(1), &mut m, 10), 1);
        assert_eq!(run_until_done(&mut Action::wait_ticks(3), &mut m, 10), 3);
    }

    #[test]
    fn wait_duration_rounds_up_to_ticks() {
        let period = Duration::from_millis(20);
        let mut m = sim_mechanisms();
        let mut wait = Action::wait(Duration::from_millis(50), period);
        assert_eq!(run_until_done(&mut wait, &mut m, 10), 3);
        let mut exact = Action::wait(Duration::from_secs(1), period);
        assert_eq!(run_until_done(&mut exact, &mut m, 100), 50);
    }

    #[test]
    fn empty_groups_are_rejected() {
        assert_eq!(
            Action::sequence(vec![]).unwrap_err(),
            CompositionError::Empty { group: "Sequence" }
        );
        assert!(Action::parallel(vec![]).is_err());
        assert!(Action::join(vec![]).is_err());
    }

    #[test]
    fn overlapping_requirements_are_rejected() {
        let a = Action::run("a", [MechanismId::Shooter], |_| {});
        let b = Action::run("b", [MechanismId::Shooter, MechanismId::Feeder], |_| {});
        assert_eq!(
            Action::parallel(vec![a, b]).unwrap_err(),
            CompositionError::Conflict {
                group: "Parallel",
                mechanism: MechanismId::Shooter
            }
        );
        // Sequential reuse of a mechanism is fine.
        let a = Action::run("a", [MechanismId::Shooter], |_| {});
        let b = Action::run("b", [MechanismId::Shooter], |_| {});
        let seq = Action::sequence(vec![a, b]).expect("sequence");
        assert_eq!(seq.requirements().len(), 1);
    }

    #[test]
    fn sequence_starts_next_child_in_same_tick() {
        let trace = Trace::default();
        let mut m = sim_mechanisms();
        let mut seq =
            Action::sequence(vec![traced(&trace, "a", 1), traced(&trace, "b", 1)]).expect("seq");
        assert_eq!(run_until_done(&mut seq, &mut m, 10), 2);
        assert_eq!(
            entries(&trace),
            ["a:start", "a:step", "a:finished", "b:start", "b:step", "b:finished"]
        );
    }

    #[test]
    fn interrupting_sequence_only_touches_running_child() {
        let trace = Trace::default();
        let mut m = sim_mechanisms();
        let mut seq =
            Action::sequence(vec![traced(&trace, "a", 1), traced(&trace, "b", 0), traced(&trace, "c", 1)])
                .expect("seq");
        seq.start(&mut m);
        seq.step(&mut m);
        seq.step(&mut m);
        seq.interrupt(&mut m);
        assert_eq!(seq.state(), ActionState::Interrupted);
        let log = entries(&trace);
        assert!(log.contains(&"b:interrupted".to_string()));
        assert!(!log.iter().any(|e| e.starts_with("c:")));
    }

    #[test]
    fn parallel_tie_goes_to_first_declared_child() {
        for _ in 0..3 {
            let trace = Trace::default();
            let mut m = sim_mechanisms();
            let mut race =
                Action::parallel(vec![traced(&trace, "first", 2), traced(&trace, "second", 2)])
                    .expect("parallel");
            assert_eq!(run_until_done(&mut race, &mut m, 10), 2);
            let log = entries(&trace);
            assert_eq!(log.last().map(String::as_str), Some("second:interrupted"));
            assert!(log.contains(&"first:finished".to_string()));
            // The loser was not stepped in the deciding tick.
            assert_eq!(log.iter().filter(|e| *e == "second:step").count(), 1);
        }
    }

    #[test]
    fn deadline_ends_with_deadline_child() {
        let trace = Trace::default();
        let mut m = sim_mechanisms();
        let mut group = Action::deadline(
            traced(&trace, "deadline", 3),
            vec![traced(&trace, "early", 1), traced(&trace, "forever", 0)],
        )
        .expect("deadline");
        assert_eq!(run_until_done(&mut group, &mut m, 10), 3);
        let log = entries(&trace);
        assert!(log.contains(&"early:finished".to_string()));
        assert!(log.contains(&"deadline:finished".to_string()));
        assert_eq!(log.last().map(String::as_str), Some("forever:interrupted"));
    }

    #[test]
    fn deadline_tie_is_deterministic() {
        // Companion finishing on the same tick as the deadline still counts
        // as finished, not interrupted.
        let trace = Trace::default();
        let mut m = sim_mechanisms();
        let mut group = Action::deadline(traced(&trace, "deadline", 2), vec![traced(&trace, "mate", 2)])
            .expect("deadline");
        assert_eq!(run_until_done(&mut group, &mut m, 10), 2);
        assert!(entries(&trace).contains(&"mate:finished".to_string()));
    }

    #[test]
    fn deadline_one_tick_wait_interrupts_roller_with_cleanup() {
        let mut m = sim_mechanisms();
        let roller = Action::run("roller", [MechanismId::Feeder], |m: &mut Mechanisms| {
            m.feeder.request_rpm(3000.0);
        })
        .finally_do(|m, _| m.feeder.request_stop());
        let mut group = Action::deadline(Action::wait_ticks(1), vec![roller]).expect("deadline");

        m.refresh_all();
        group.start(&mut m);
        assert_eq!(group.step(&mut m), ActionState::Finished);
        m.apply_all();

        let roller = m.feeder.controller();
        assert_eq!(roller.request(Feeder::ROLLER), Some(ChannelRequest::Voltage(0.0)));
        assert_eq!(roller.applied(Feeder::ROLLER).volts, 0.0);
    }

    #[test]
    fn run_without_cleanup_holds_last_request() {
        let mut m = sim_mechanisms();
        let roller = Action::run("roller", [MechanismId::Feeder], |m: &mut Mechanisms| {
            m.feeder.request_rpm(3000.0);
        });
        let mut group = Action::deadline(Action::wait_ticks(1), vec![roller]).expect("deadline");
        m.refresh_all();
        group.start(&mut m);
        group.step(&mut m);
        assert_eq!(
            m.feeder.controller().request(ChannelId(0)),
            Some(ChannelRequest::Velocity(3000.0))
        );
    }

    #[test]
    fn until_checks_condition_after_inner_step() {
        let trace = Trace::default();
        let mut m = sim_mechanisms();
        let flag = Arc::new(Mutex::new(false));
        let f = flag.clone();
        let mut action = traced(&trace, "inner", 0)
            .until(move |_| f.lock().map(|v| *v).unwrap_or(false));
        action.start(&mut m);
        assert_eq!(action.step(&mut m), ActionState::Running);
        if let Ok(mut v) = flag.lock() {
            *v = true;
        }
        assert_eq!(action.step(&mut m), ActionState::Finished);
        assert_eq!(
            entries(&trace),
            ["inner:start", "inner:step", "inner:step", "inner:interrupted"]
        );
    }

    #[test]
    fn join_waits_for_every_child() {
        let trace = Trace::default();
        let mut m = sim_mechanisms();
        let mut all = Action::join(vec![traced(&trace, "a", 1), traced(&trace, "b", 3)]).expect("join");
        assert_eq!(run_until_done(&mut all, &mut m, 10), 3);
        // A finished child is not stepped again.
        assert_eq!(entries(&trace).iter().filter(|e| *e == "a:step").count(), 1);
    }

    #[test]
    fn reset_makes_action_reusable() {
        let trace = Trace::default();
        let mut m = sim_mechanisms();
        let mut seq = traced(&trace, "a", 1).then(Action::wait_ticks(2));
        assert_eq!(run_until_done(&mut seq, &mut m, 10), 3);
        assert_eq!(seq.step(&mut m), ActionState::Finished, "terminal until reset");
        seq.reset();
        assert_eq!(seq.state(), ActionState::Idle);
        assert_eq!(run_until_done(&mut seq, &mut m, 10), 3);
    }

    #[test]
    fn until_keeps_name_and_requirements() {
        let a = Action::run("spin", [MechanismId::Shooter], |_| {}).until(|_| false);
        assert_eq!(a.name(), "spin");
        assert!(a.requirements().contains(&MechanismId::Shooter));
        assert_eq!(a.named("renamed").name(), "renamed");
    }
}
