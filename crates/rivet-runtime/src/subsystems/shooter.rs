//! Shooter: two flywheels sharing one gain set.  The right wheel may run at
//! a fraction of the left to put spin on the note.

use rivet_hal::io::MechanismIo;
use rivet_hal::sim::{FlywheelModel, SimIo};
use rivet_types::{ChannelId, ChannelRequest, MechanismId};

use crate::action::Action;
use crate::mechanism::{
    ChannelSpec, ControlContext, FeedforwardModel, Mechanism, MechanismSpec, drive_velocity,
    drive_velocity_pair, drive_voltage,
};

/// Fraction of the target either wheel may be off and still count as at
/// speed.
pub const SETPOINT_TOLERANCE: f64 = 0.05;

pub struct Shooter {
    controller: Mechanism,
}

impl Shooter {
    pub const LEFT: ChannelId = ChannelId(0);
    pub const RIGHT: ChannelId = ChannelId(1);

    pub const SPEC: MechanismSpec = MechanismSpec {
        channels: &[
            ChannelSpec {
                name: "Left",
                gains: Some("Shooter/Flywheel"),
                feedforward: FeedforwardModel::SimpleMotor,
            },
            ChannelSpec {
                name: "Right",
                gains: Some("Shooter/Flywheel"),
                feedforward: FeedforwardModel::SimpleMotor,
            },
        ],
        sensors: &[],
    };

    pub fn new(io: Box<dyn MechanismIo>, ctx: &ControlContext) -> Self {
        Self {
            controller: Mechanism::new(MechanismId::Shooter, &Self::SPEC, io, ctx),
        }
    }

    pub fn sim_io(dt: f64) -> SimIo {
        SimIo::new(MechanismId::Shooter.name(), dt)
            .with_plant(FlywheelModel::default())
            .with_plant(FlywheelModel::default())
    }

    pub fn controller(&self) -> &Mechanism {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Mechanism {
        &mut self.controller
    }

    /// Left at `rpm`, right at `rpm × differential`.
    pub fn request_rpm(&mut self, rpm: f64, differential: f64) {
        self.controller
            .set_request(Self::LEFT, ChannelRequest::Velocity(rpm));
        self.controller
            .set_request(Self::RIGHT, ChannelRequest::Velocity(rpm * differential));
    }

    pub fn request_stop(&mut self) {
        self.controller.stop(Self::LEFT);
        self.controller.stop(Self::RIGHT);
    }

    pub fn left_rpm(&self) -> f64 {
        self.controller.channel_inputs(Self::LEFT).velocity_rpm
    }

    pub fn right_rpm(&self) -> f64 {
        self.controller.channel_inputs(Self::RIGHT).velocity_rpm
    }

    /// Both wheels under velocity control and within
    /// [`SETPOINT_TOLERANCE`] of their targets.
    pub fn at_setpoint(&self) -> bool {
        [Self::LEFT, Self::RIGHT].into_iter().all(|ch| {
            match self.controller.request(ch) {
                Some(ChannelRequest::Velocity(target)) => {
                    let measured = self.controller.channel_inputs(ch).velocity_rpm;
                    (target - measured).abs() <= SETPOINT_TOLERANCE * target.abs()
                }
                _ => false,
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────────────────

/// Spin both wheels; the right at `rpm × differential`.
pub fn set_rpm(rpm: f64, differential: f64) -> Action {
    drive_velocity_pair(MechanismId::Shooter, Shooter::LEFT, Shooter::RIGHT, rpm, differential)
        .named("Shooter.set_rpm")
}

pub fn set_left_rpm(rpm: f64) -> Action {
    drive_velocity(MechanismId::Shooter, Shooter::LEFT, rpm).named("Shooter.set_left_rpm")
}

pub fn set_right_rpm(rpm: f64) -> Action {
    drive_velocity(MechanismId::Shooter, Shooter::RIGHT, rpm).named("Shooter.set_right_rpm")
}

pub fn set_left_voltage(volts: f64) -> Action {
    drive_voltage(MechanismId::Shooter, Shooter::LEFT, volts).named("Shooter.set_left_voltage")
}

pub fn set_right_voltage(volts: f64) -> Action {
    drive_voltage(MechanismId::Shooter, Shooter::RIGHT, volts).named("Shooter.set_right_voltage")
}

/// Both wheels at 0 V until interrupted.
pub fn stop() -> Action {
    Action::run("Shooter.stop", [MechanismId::Shooter], |m| m.shooter.request_stop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sim_mechanisms;

    #[test]
    fn differential_scales_right_wheel() {
        let mut m = sim_mechanisms();
        let mut action = set_rpm(3000.0, 0.3);
        action.start(&mut m);
        action.step(&mut m);
        let c = m.shooter.controller();
        assert_eq!(c.request(Shooter::LEFT), Some(ChannelRequest::Velocity(3000.0)));
        assert_eq!(c.request(Shooter::RIGHT), Some(ChannelRequest::Velocity(900.0)));
    }

    #[test]
    fn reaches_setpoint_in_sim() {
        let mut m = sim_mechanisms();
        let mut action = set_rpm(4000.0, 0.5);
        action.start(&mut m);
        assert!(!m.shooter.at_setpoint());
        for _ in 0..150 {
            m.refresh_all();
            action.step(&mut m);
            m.apply_all();
        }
        m.refresh_all();
        assert!(m.shooter.at_setpoint(), "left {} right {}", m.shooter.left_rpm(), m.shooter.right_rpm());
    }

    #[test]
    fn open_loop_is_never_at_setpoint() {
        let mut m = sim_mechanisms();
        let mut left = set_left_voltage(6.0);
        let mut right = set_right_voltage(6.0);
        left.start(&mut m);
        right.start(&mut m);
        left.step(&mut m);
        right.step(&mut m);
        assert!(!m.shooter.at_setpoint());

        let mut halt = stop();
        halt.start(&mut m);
        halt.step(&mut m);
        assert_eq!(m.shooter.controller().request(Shooter::RIGHT), Some(ChannelRequest::Voltage(0.0)));
    }

    #[test]
    fn single_side_requests_leave_the_other_alone() {
        let mut m = sim_mechanisms();
        let mut action = set_right_rpm(1200.0);
        action.start(&mut m);
        action.step(&mut m);
        assert_eq!(m.shooter.controller().request(Shooter::LEFT), None);
        let mut action = set_left_rpm(2400.0);
        action.start(&mut m);
        action.step(&mut m);
        assert_eq!(
            m.shooter.controller().request(Shooter::LEFT),
            Some(ChannelRequest::Velocity(2400.0))
        );
    }
}
