//! The robot's mechanisms and their backend wiring.
//!
//! | Mechanism | Channels | Sensors | Current limit |
//! |---|---|---|---|
//! | [`Intake`] | pivot (position, arm FF), roller (velocity) | – | 55 A |
//! | [`Feeder`] | roller (velocity) | feeder beam-break, shooter beam-break | 80 A |
//! | [`Shooter`] | left, right flywheel (velocity) | – | 100 A |
//! | [`Pivot`] | arm (position, arm FF) | – | 60 A |
//! | [`Climber`] | winch (voltage) | – | 80 A |
//! | [`Drive`] | external [`DriveBase`] | – | – |
//!
//! [`Backends`] picks one backend per mechanism from the execution mode,
//! once, at startup.

pub mod climber;
pub mod drive;
pub mod feeder;
pub mod intake;
pub mod pivot;
pub mod shooter;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use rivet_hal::driver::{BeamBreakDriver, DisconnectedDriver, MotorDriver};
use rivet_hal::io::MechanismIo;
use rivet_hal::live::LiveIo;
use rivet_hal::replay::ReplayIo;
use rivet_types::{EventPayload, ExecutionMode, MechanismId, MechanismTelemetry, RivetError};
use tracing::info;

use crate::mechanism::{ControlContext, Mechanism, MechanismSpec};

pub use climber::Climber;
pub use drive::{Drive, DriveBase, PathStatus, StationaryDrive};
pub use feeder::{Feeder, FeederSensors};
pub use intake::Intake;
pub use pivot::Pivot;
pub use shooter::Shooter;

// ─────────────────────────────────────────────────────────────────────────────
// Backends
// ─────────────────────────────────────────────────────────────────────────────

/// One backend per mechanism, ready to be handed to [`Mechanisms::new`].
pub struct Backends {
    pub intake: Box<dyn MechanismIo>,
    pub feeder: Box<dyn MechanismIo>,
    pub shooter: Box<dyn MechanismIo>,
    pub pivot: Box<dyn MechanismIo>,
    pub climber: Box<dyn MechanismIo>,
    pub drive: Box<dyn DriveBase>,
    /// Beam-break handles when the feeder is simulated.
    pub sim_sensors: Option<FeederSensors>,
}

impl Backends {
    /// Backends for `mode`.  `replay_dir` holds one `<Mechanism>.jsonl` log
    /// per mechanism and is only read in replay mode.
    ///
    /// # Errors
    ///
    /// [`RivetError::Config`] when a replay log exists but cannot be read,
    /// [`RivetError::Serialization`] when it cannot be parsed.
    pub fn for_mode(
        mode: ExecutionMode,
        period: Duration,
        replay_dir: Option<&Path>,
    ) -> Result<Self, RivetError> {
        info!(%mode, "wiring backends");
        match mode {
            ExecutionMode::Live => Ok(Self::live()),
            ExecutionMode::Simulated => Ok(Self::simulated(period.as_secs_f64())),
            ExecutionMode::Replay => Self::replay(replay_dir),
        }
    }

    /// Live backends.  No device bus is linked into this build, so every
    /// device is a [`DisconnectedDriver`] and each mechanism holds zero.
    pub fn live() -> Self {
        Self {
            intake: live_io(MechanismId::Intake, &Intake::SPEC),
            feeder: live_io(MechanismId::Feeder, &Feeder::SPEC),
            shooter: live_io(MechanismId::Shooter, &Shooter::SPEC),
            pivot: live_io(MechanismId::Pivot, &Pivot::SPEC),
            climber: live_io(MechanismId::Climber, &Climber::SPEC),
            drive: Box::new(StationaryDrive),
            sim_sensors: None,
        }
    }

    /// Physics-model backends stepping `dt` seconds per command.
    pub fn simulated(dt: f64) -> Self {
        let (feeder, sensors) = Feeder::sim_io(dt);
        Self {
            intake: Box::new(Intake::sim_io(dt)),
            feeder: Box::new(feeder),
            shooter: Box::new(Shooter::sim_io(dt)),
            pivot: Box::new(Pivot::sim_io(dt)),
            climber: Box::new(Climber::sim_io(dt)),
            drive: Box::new(StationaryDrive),
            sim_sensors: Some(sensors),
        }
    }

    /// Replay backends.  A mechanism without a log replays zeros.
    pub fn replay(dir: Option<&Path>) -> Result<Self, RivetError> {
        Ok(Self {
            intake: replay_io(MechanismId::Intake, &Intake::SPEC, dir)?,
            feeder: replay_io(MechanismId::Feeder, &Feeder::SPEC, dir)?,
            shooter: replay_io(MechanismId::Shooter, &Shooter::SPEC, dir)?,
            pivot: replay_io(MechanismId::Pivot, &Pivot::SPEC, dir)?,
            climber: replay_io(MechanismId::Climber, &Climber::SPEC, dir)?,
            drive: Box::new(StationaryDrive),
            sim_sensors: None,
        })
    }
}

fn live_io(id: MechanismId, spec: &MechanismSpec) -> Box<dyn MechanismIo> {
    let motors = spec
        .channels
        .iter()
        .map(|c| DisconnectedDriver::new(format!("{id}/{}", c.name)) as Box<dyn MotorDriver>)
        .collect();
    let sensors = spec
        .sensors
        .iter()
        .map(|s| DisconnectedDriver::new(format!("{id}/{s}")) as Box<dyn BeamBreakDriver>)
        .collect();
    Box::new(LiveIo::new(id.name(), motors, sensors))
}

fn replay_io(
    id: MechanismId,
    spec: &MechanismSpec,
    dir: Option<&Path>,
) -> Result<Box<dyn MechanismIo>, RivetError> {
    let log = match dir.map(|d| d.join(format!("{id}.jsonl"))) {
        Some(path) if path.exists() => {
            let file = File::open(&path)
                .map_err(|e| RivetError::Config(format!("{}: {e}", path.display())))?;
            let log = ReplayIo::from_json_lines(BufReader::new(file))?;
            info!(mechanism = %id, snapshots = log.len(), "replay log loaded");
            log
        }
        _ => {
            info!(mechanism = %id, "no replay log; replaying zeros");
            Vec::new()
        }
    };
    Ok(Box::new(ReplayIo::new(log, spec.channels.len(), spec.sensors.len())))
}

// ─────────────────────────────────────────────────────────────────────────────
// Mechanisms
// ─────────────────────────────────────────────────────────────────────────────

/// Every mechanism on the robot.  Actions receive `&mut Mechanisms` each
/// step; nothing else mutates them during a tick.
pub struct Mechanisms {
    pub intake: Intake,
    pub feeder: Feeder,
    pub shooter: Shooter,
    pub pivot: Pivot,
    pub climber: Climber,
    pub drive: Drive,
    sim_sensors: Option<FeederSensors>,
}

impl Mechanisms {
    pub fn new(backends: Backends, ctx: &ControlContext) -> Self {
        Self {
            intake: Intake::new(backends.intake, ctx),
            feeder: Feeder::new(backends.feeder, ctx),
            shooter: Shooter::new(backends.shooter, ctx),
            pivot: Pivot::new(backends.pivot, ctx),
            climber: Climber::new(backends.climber, ctx),
            drive: Drive::new(backends.drive),
            sim_sensors: backends.sim_sensors,
        }
    }

    /// The controller for `id`; `None` for the drive, which is external.
    pub fn controller(&self, id: MechanismId) -> Option<&Mechanism> {
        match id {
            MechanismId::Intake => Some(self.intake.controller()),
            MechanismId::Feeder => Some(self.feeder.controller()),
            MechanismId::Shooter => Some(self.shooter.controller()),
            MechanismId::Pivot => Some(self.pivot.controller()),
            MechanismId::Climber => Some(self.climber.controller()),
            MechanismId::Drive => None,
        }
    }

    pub fn controller_mut(&mut self, id: MechanismId) -> Option<&mut Mechanism> {
        match id {
            MechanismId::Intake => Some(self.intake.controller_mut()),
            MechanismId::Feeder => Some(self.feeder.controller_mut()),
            MechanismId::Shooter => Some(self.shooter.controller_mut()),
            MechanismId::Pivot => Some(self.pivot.controller_mut()),
            MechanismId::Climber => Some(self.climber.controller_mut()),
            MechanismId::Drive => None,
        }
    }

    fn controllers_mut(&mut self) -> [&mut Mechanism; 5] {
        [
            self.intake.controller_mut(),
            self.feeder.controller_mut(),
            self.shooter.controller_mut(),
            self.pivot.controller_mut(),
            self.climber.controller_mut(),
        ]
    }

    /// Read every backend.
    pub fn refresh_all(&mut self) {
        for m in self.controllers_mut() {
            m.refresh();
        }
    }

    /// Request 0 V on every channel of every mechanism and halt the drive.
    pub fn stop_all(&mut self) {
        for m in self.controllers_mut() {
            m.stop_all();
        }
        self.drive.stop();
    }

    /// Send every channel's command.
    pub fn apply_all(&mut self) {
        for m in self.controllers_mut() {
            m.apply();
        }
    }

    /// One record per controlled mechanism, in [`MechanismId::ALL`] order.
    pub fn telemetry(&self) -> Vec<MechanismTelemetry> {
        MechanismId::ALL
            .iter()
            .filter_map(|id| self.controller(*id))
            .map(Mechanism::telemetry)
            .collect()
    }

    pub fn take_alerts(&mut self) -> Vec<EventPayload> {
        self.controllers_mut()
            .into_iter()
            .flat_map(|m| m.take_alerts())
            .collect()
    }

    /// Simulated beam-breaks, for scripts that move game pieces.
    pub fn sim_sensors(&self) -> Option<&FeederSensors> {
        self.sim_sensors.as_ref()
    }
}
