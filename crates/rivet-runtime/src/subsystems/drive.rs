//! Drive: the drivetrain is owned by an external path follower.  The core
//! only starts named paths, polls their progress, and stops them.

use rivet_types::{MechanismId, RivetError};
use tracing::{info, warn};

use crate::action::Action;

/// Progress of the path being followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathStatus {
    #[default]
    Idle,
    Following,
    Complete,
    /// The follower gave up; the path will not complete.
    Aborted,
}

impl PathStatus {
    pub fn is_done(self) -> bool {
        matches!(self, PathStatus::Complete | PathStatus::Aborted)
    }
}

/// An external drivetrain that can follow named paths.
pub trait DriveBase: Send {
    /// Begin following `path`.
    ///
    /// # Errors
    ///
    /// [`RivetError::Config`] when the path is unknown.
    fn start_path(&mut self, path: &str) -> Result<(), RivetError>;

    /// Advance the follower one tick.
    fn step_path(&mut self) -> PathStatus;

    /// Stop and hold position.
    fn stop(&mut self);
}

/// A drivetrain that is already wherever every path ends.  Each path
/// completes on its first step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StationaryDrive;

impl DriveBase for StationaryDrive {
    fn start_path(&mut self, _path: &str) -> Result<(), RivetError> {
        Ok(())
    }

    fn step_path(&mut self) -> PathStatus {
        PathStatus::Complete
    }

    fn stop(&mut self) {}
}

pub struct Drive {
    base: Box<dyn DriveBase>,
    path: Option<String>,
    status: PathStatus,
}

impl Drive {
    pub fn new(base: Box<dyn DriveBase>) -> Self {
        Self {
            base,
            path: None,
            status: PathStatus::Idle,
        }
    }

    pub fn status(&self) -> PathStatus {
        self.status
    }

    /// Name of the path being followed.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn start(&mut self, path: &str) {
        match self.base.start_path(path) {
            Ok(()) => {
                info!(path, "following path");
                self.path = Some(path.to_string());
                self.status = PathStatus::Following;
            }
            Err(e) => {
                warn!(path, error = %e, "path rejected");
                self.path = None;
                self.status = PathStatus::Aborted;
            }
        }
    }

    fn step(&mut self) -> PathStatus {
        if self.status == PathStatus::Following {
            self.status = self.base.step_path();
        }
        self.status
    }

    pub(crate) fn stop(&mut self) {
        self.base.stop();
        self.path = None;
        self.status = PathStatus::Idle;
    }
}

/// Follow `path` until the drivetrain reports it done.  Interrupting stops
/// the drivetrain.
pub fn run_path(path: impl Into<String>) -> Action {
    let path = path.into();
    let name = format!("RunPath:{path}");
    Action::run(name, [MechanismId::Drive], |m| {
        m.drive.step();
    })
    .until(|m| m.drive.status().is_done())
    .on_start(move |m| m.drive.start(&path))
    .finally_do(|m, interrupted| {
        if interrupted {
            m.drive.stop();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::action::ActionState;
    use crate::subsystems::{Backends, Mechanisms};
    use crate::testing::context;
    use rivet_types::ExecutionMode;

    #[derive(Default)]
    struct Calls {
        started: Vec<String>,
        steps: u32,
        stopped: u32,
    }

    /// Follows any path but `"missing"` for `length` steps.
    struct ScriptedDrive {
        length: u32,
        calls: Arc<Mutex<Calls>>,
    }

    impl DriveBase for ScriptedDrive {
        fn start_path(&mut self, path: &str) -> Result<(), RivetError> {
            if path == "missing" {
                return Err(RivetError::Config(format!("no path named {path}")));
            }
            if let Ok(mut c) = self.calls.lock() {
                c.started.push(path.to_string());
                c.steps = 0;
            }
            Ok(())
        }

        fn step_path(&mut self) -> PathStatus {
            let Ok(mut c) = self.calls.lock() else {
                return PathStatus::Aborted;
            };
            c.steps += 1;
            if c.steps >= self.length {
                PathStatus::Complete
            } else {
                PathStatus::Following
            }
        }

        fn stop(&mut self) {
            if let Ok(mut c) = self.calls.lock() {
                c.stopped += 1;
            }
        }
    }

    fn mechanisms(length: u32) -> (Mechanisms, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut backends = Backends::simulated(0.02);
        backends.drive = Box::new(ScriptedDrive {
            length,
            calls: Arc::clone(&calls),
        });
        (
            Mechanisms::new(backends, &context(ExecutionMode::Simulated)),
            calls,
        )
    }

    #[test]
    fn path_runs_until_complete() {
        let (mut m, calls) = mechanisms(3);
        let mut action = run_path("AmpSide");
        assert_eq!(action.name(), "RunPath:AmpSide");
        action.start(&mut m);
        assert_eq!(m.drive.path(), Some("AmpSide"));
        assert_eq!(action.step(&mut m), ActionState::Running);
        assert_eq!(action.step(&mut m), ActionState::Running);
        assert_eq!(action.step(&mut m), ActionState::Finished);
        let c = calls.lock().expect("calls");
        assert_eq!(c.started, ["AmpSide"]);
        assert_eq!(c.stopped, 0);
    }

    #[test]
    fn interrupt_stops_the_drivetrain() {
        let (mut m, calls) = mechanisms(100);
        let mut action = run_path("Center");
        action.start(&mut m);
        action.step(&mut m);
        action.interrupt(&mut m);
        assert_eq!(action.state(), ActionState::Interrupted);
        assert_eq!(m.drive.status(), PathStatus::Idle);
        assert_eq!(calls.lock().expect("calls").stopped, 1);
    }

    #[test]
    fn unknown_path_aborts_immediately() {
        let (mut m, _calls) = mechanisms(3);
        let mut action = run_path("missing");
        action.start(&mut m);
        assert_eq!(action.step(&mut m), ActionState::Finished);
        assert_eq!(m.drive.status(), PathStatus::Aborted);
    }

    #[test]
    fn stationary_drive_completes_on_first_step() {
        let ctx = context(ExecutionMode::Simulated);
        let mut m = Mechanisms::new(Backends::simulated(0.02), &ctx);
        let mut action = run_path("Anything");
        action.start(&mut m);
        assert_eq!(action.step(&mut m), ActionState::Finished);
    }
}
