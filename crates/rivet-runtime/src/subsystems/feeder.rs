//! Feeder: one velocity-controlled roller between intake and shooter, with a
//! beam-break at each end of the note path.

use rivet_hal::io::MechanismIo;
use rivet_hal::sim::{DcMotor, FlywheelModel, SimBeamBreak, SimIo};
use rivet_types::{ChannelId, ChannelRequest, MechanismId};

use crate::action::Action;
use crate::mechanism::{
    ChannelSpec, ControlContext, FeedforwardModel, Mechanism, MechanismSpec, drive_velocity,
};

/// Handles to the simulated feeder beam-breaks.
#[derive(Debug, Clone)]
pub struct FeederSensors {
    /// Beam-break where a note enters the feeder.
    pub feeder: SimBeamBreak,
    /// Beam-break where a note leaves toward the shooter.
    pub shooter: SimBeamBreak,
}

pub struct Feeder {
    controller: Mechanism,
}

impl Feeder {
    pub const ROLLER: ChannelId = ChannelId(0);
    const FEEDER_BEAMBREAK: usize = 0;
    const SHOOTER_BEAMBREAK: usize = 1;

    pub const SPEC: MechanismSpec = MechanismSpec {
        channels: &[ChannelSpec {
            name: "Roller",
            gains: Some("Feeder/Roller"),
            feedforward: FeedforwardModel::SimpleMotor,
        }],
        sensors: &["FeederBeamBreak", "ShooterBeamBreak"],
    };

    pub fn new(io: Box<dyn MechanismIo>, ctx: &ControlContext) -> Self {
        Self {
            controller: Mechanism::new(MechanismId::Feeder, &Self::SPEC, io, ctx),
        }
    }

    /// Simulated roller plus two beam-breaks.
    pub fn sim_io(dt: f64) -> (SimIo, FeederSensors) {
        let roller = DcMotor {
            free_speed_rpm: 6000.0,
            stall_current_amps: 40.0,
        };
        let io = SimIo::new(MechanismId::Feeder.name(), dt)
            .with_plant(FlywheelModel::new(roller, 0.1))
            .with_beam_break()
            .with_beam_break();
        // Both indices were just added.
        let sensors = FeederSensors {
            feeder: io.beam_break(Self::FEEDER_BEAMBREAK).unwrap_or_default(),
            shooter: io.beam_break(Self::SHOOTER_BEAMBREAK).unwrap_or_default(),
        };
        (io, sensors)
    }

    pub fn controller(&self) -> &Mechanism {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Mechanism {
        &mut self.controller
    }

    pub fn request_rpm(&mut self, rpm: f64) {
        self.controller
            .set_request(Self::ROLLER, ChannelRequest::Velocity(rpm));
    }

    pub fn request_stop(&mut self) {
        self.controller.stop(Self::ROLLER);
    }

    pub fn feeder_beambreak_obstructed(&self) -> bool {
        self.controller.sensor(Self::FEEDER_BEAMBREAK)
    }

    pub fn shooter_beambreak_obstructed(&self) -> bool {
        self.controller.sensor(Self::SHOOTER_BEAMBREAK)
    }

    pub fn velocity_rpm(&self) -> f64 {
        self.controller.channel_inputs(Self::ROLLER).velocity_rpm
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────────────────

/// Run the roller at `rpm` until interrupted.
pub fn set_rpm(rpm: f64) -> Action {
    drive_velocity(MechanismId::Feeder, Feeder::ROLLER, rpm).named("Feeder.set_rpm")
}

/// Stop the roller until interrupted.
pub fn stop() -> Action {
    Action::run("Feeder.stop", [MechanismId::Feeder], |m| m.feeder.request_stop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sim_mechanisms;

    #[test]
    fn sim_beam_breaks_reach_the_snapshot() {
        let mut m = sim_mechanisms();
        let sensors = m.sim_sensors().cloned().expect("simulated");
        m.refresh_all();
        assert!(!m.feeder.feeder_beambreak_obstructed());

        sensors.feeder.set_obstructed(true);
        m.refresh_all();
        assert!(m.feeder.feeder_beambreak_obstructed());
        assert!(!m.feeder.shooter_beambreak_obstructed());
    }

    #[test]
    fn roller_spins_up_in_sim() {
        let mut m = sim_mechanisms();
        let mut action = set_rpm(3000.0);
        action.start(&mut m);
        for _ in 0..100 {
            m.refresh_all();
            action.step(&mut m);
            m.apply_all();
        }
        m.refresh_all();
        assert!((m.feeder.velocity_rpm() - 3000.0).abs() < 150.0);
    }

    #[test]
    fn stop_requests_zero_volts() {
        let mut m = sim_mechanisms();
        m.feeder.request_rpm(2000.0);
        let mut action = stop();
        action.start(&mut m);
        action.step(&mut m);
        assert_eq!(
            m.feeder.controller().request(Feeder::ROLLER),
            Some(ChannelRequest::Voltage(0.0))
        );
    }
}
