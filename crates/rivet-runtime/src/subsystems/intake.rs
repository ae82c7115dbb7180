//! Intake: a pivoting arm that deploys a velocity-controlled roller.

use rivet_hal::io::MechanismIo;
use rivet_hal::sim::{ArmModel, DcMotor, FlywheelModel, SimIo};
use rivet_types::{ChannelId, ChannelRequest, MechanismId};

use crate::action::Action;
use crate::mechanism::{
    ChannelSpec, ControlContext, FeedforwardModel, Mechanism, MechanismSpec, drive_position,
    drive_velocity, drive_voltage, stop_channel,
};

/// Pivot angle with the intake deployed on the floor.
pub const DOWN_RADIANS: f64 = 0.0;
/// Pivot angle with the intake stowed.
pub const UP_RADIANS: f64 = 1.9;
/// Roller speed while collecting.
pub const INTAKE_RPM: f64 = 3000.0;

pub struct Intake {
    controller: Mechanism,
    angle_offset: f64,
}

impl Intake {
    pub const PIVOT: ChannelId = ChannelId(0);
    pub const ROLLER: ChannelId = ChannelId(1);

    pub const SPEC: MechanismSpec = MechanismSpec {
        channels: &[
            ChannelSpec {
                name: "Pivot",
                gains: Some("Intake/Pivot"),
                feedforward: FeedforwardModel::Arm,
            },
            ChannelSpec {
                name: "Roller",
                gains: Some("Intake/Roller"),
                feedforward: FeedforwardModel::SimpleMotor,
            },
        ],
        sensors: &[],
    };

    pub fn new(io: Box<dyn MechanismIo>, ctx: &ControlContext) -> Self {
        Self {
            controller: Mechanism::new(MechanismId::Intake, &Self::SPEC, io, ctx),
            angle_offset: 0.0,
        }
    }

    /// Add `offset` radians to every reported pivot angle, for encoders
    /// whose zero does not sit at [`DOWN_RADIANS`].
    pub fn with_angle_offset(mut self, offset: f64) -> Self {
        self.angle_offset = offset;
        self
    }

    /// Simulated pivot arm and roller.
    pub fn sim_io(dt: f64) -> SimIo {
        let pivot = DcMotor {
            free_speed_rpm: 60.0,
            stall_current_amps: 60.0,
        };
        let roller = DcMotor {
            free_speed_rpm: 6000.0,
            stall_current_amps: 40.0,
        };
        SimIo::new(MechanismId::Intake.name(), dt)
            .with_plant(ArmModel::new(pivot, 0.4, 20.0, (DOWN_RADIANS, 2.0), DOWN_RADIANS))
            .with_plant(FlywheelModel::new(roller, 0.1))
    }

    pub fn controller(&self) -> &Mechanism {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Mechanism {
        &mut self.controller
    }

    pub fn request_pivot_target(&mut self, radians: f64) {
        self.controller
            .set_request(Self::PIVOT, ChannelRequest::Position(radians));
    }

    pub fn request_pivot_voltage(&mut self, volts: f64) {
        self.controller
            .set_request(Self::PIVOT, ChannelRequest::Voltage(volts));
    }

    pub fn request_roller_rpm(&mut self, rpm: f64) {
        self.controller
            .set_request(Self::ROLLER, ChannelRequest::Velocity(rpm));
    }

    /// Measured pivot angle plus the configured offset.
    pub fn angle_radians(&self) -> f64 {
        self.controller.channel_inputs(Self::PIVOT).position_rad + self.angle_offset
    }

    /// The pivot position setpoint, if the pivot is under position control.
    pub fn target_radians(&self) -> Option<f64> {
        match self.controller.request(Self::PIVOT) {
            Some(ChannelRequest::Position(rad)) => Some(rad),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────────────────

pub fn set_pivot_target(radians: f64) -> Action {
    drive_position(MechanismId::Intake, Intake::PIVOT, radians).named("Intake.set_pivot_target")
}

pub fn set_roller_rpm(rpm: f64) -> Action {
    drive_velocity(MechanismId::Intake, Intake::ROLLER, rpm).named("Intake.set_roller_rpm")
}

pub fn set_pivot_voltage(volts: f64) -> Action {
    drive_voltage(MechanismId::Intake, Intake::PIVOT, volts).named("Intake.set_pivot_voltage")
}

/// Deploy and collect; `reverse` spits a note back out instead.
pub fn set_intake_down(reverse: bool) -> Action {
    let rpm = if reverse { -INTAKE_RPM } else { INTAKE_RPM };
    Action::run("Intake.down", [MechanismId::Intake], move |m| {
        m.intake.request_pivot_target(DOWN_RADIANS);
        m.intake.request_roller_rpm(rpm);
    })
}

/// Stow with the roller stopped.
pub fn set_intake_up() -> Action {
    Action::run("Intake.up", [MechanismId::Intake], |m| {
        m.intake.request_pivot_target(UP_RADIANS);
        m.intake.controller_mut().stop(Intake::ROLLER);
    })
}

pub fn stop_pivot() -> Action {
    stop_channel(MechanismId::Intake, Intake::PIVOT).named("Intake.stop_pivot")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sim_mechanisms;

    fn run_ticks(m: &mut crate::subsystems::Mechanisms, action: &mut Action, ticks: usize) {
        action.start(m);
        for _ in 0..ticks {
            m.refresh_all();
            action.step(m);
            m.apply_all();
        }
        m.refresh_all();
    }

    #[test]
    fn down_requests_pivot_and_roller() {
        let mut m = sim_mechanisms();
        let mut action = set_intake_down(false);
        run_ticks(&mut m, &mut action, 1);
        assert_eq!(m.intake.target_radians(), Some(DOWN_RADIANS));
        assert_eq!(
            m.intake.controller().request(Intake::ROLLER),
            Some(ChannelRequest::Velocity(INTAKE_RPM))
        );

        let mut reverse = set_intake_down(true);
        run_ticks(&mut m, &mut reverse, 1);
        assert_eq!(
            m.intake.controller().request(Intake::ROLLER),
            Some(ChannelRequest::Velocity(-INTAKE_RPM))
        );
    }

    #[test]
    fn pivot_rises_toward_stowed_angle_in_sim() {
        let mut m = sim_mechanisms();
        let mut action = set_intake_up();
        run_ticks(&mut m, &mut action, 150);
        assert!(m.intake.angle_radians() > 1.0, "angle {}", m.intake.angle_radians());
        assert_eq!(
            m.intake.controller().request(Intake::ROLLER),
            Some(ChannelRequest::Voltage(0.0))
        );
    }

    #[test]
    fn angle_offset_is_added_to_measurement() {
        let ctx = crate::testing::context(rivet_types::ExecutionMode::Simulated);
        let mut intake =
            Intake::new(Box::new(Intake::sim_io(ctx.dt())), &ctx).with_angle_offset(0.25);
        intake.controller_mut().refresh();
        assert!((intake.angle_radians() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn voltage_request_clears_position_target() {
        let mut m = sim_mechanisms();
        m.intake.request_pivot_target(1.0);
        let mut action = set_pivot_voltage(2.0);
        run_ticks(&mut m, &mut action, 1);
        assert_eq!(m.intake.target_radians(), None);

        let mut stop = stop_pivot();
        stop.start(&mut m);
        assert_eq!(stop.step(&mut m), crate::action::ActionState::Finished);
        assert_eq!(
            m.intake.controller().request(Intake::PIVOT),
            Some(ChannelRequest::Voltage(0.0))
        );
    }
}
