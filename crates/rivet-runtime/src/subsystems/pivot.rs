//! Pivot: the arm that aims the shooter.

use rivet_hal::io::MechanismIo;
use rivet_hal::sim::{ArmModel, DcMotor, SimIo};
use rivet_types::{ChannelId, ChannelRequest, MechanismId};

use crate::action::Action;
use crate::mechanism::{
    ChannelSpec, ControlContext, FeedforwardModel, Mechanism, MechanismSpec, drive_position,
    drive_voltage,
};

pub struct Pivot {
    controller: Mechanism,
}

impl Pivot {
    pub const ARM: ChannelId = ChannelId(0);

    pub const SPEC: MechanismSpec = MechanismSpec {
        channels: &[ChannelSpec {
            name: "Arm",
            gains: Some("Pivot/Arm"),
            feedforward: FeedforwardModel::Arm,
        }],
        sensors: &[],
    };

    pub fn new(io: Box<dyn MechanismIo>, ctx: &ControlContext) -> Self {
        Self {
            controller: Mechanism::new(MechanismId::Pivot, &Self::SPEC, io, ctx),
        }
    }

    pub fn sim_io(dt: f64) -> SimIo {
        let motor = DcMotor {
            free_speed_rpm: 60.0,
            stall_current_amps: 60.0,
        };
        SimIo::new(MechanismId::Pivot.name(), dt)
            .with_plant(ArmModel::new(motor, 0.4, 20.0, (0.0, 1.6), 0.0))
    }

    pub fn controller(&self) -> &Mechanism {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Mechanism {
        &mut self.controller
    }

    pub fn request_target(&mut self, radians: f64) {
        self.controller
            .set_request(Self::ARM, ChannelRequest::Position(radians));
    }

    pub fn request_voltage(&mut self, volts: f64) {
        self.controller
            .set_request(Self::ARM, ChannelRequest::Voltage(volts));
    }

    pub fn angle_radians(&self) -> f64 {
        self.controller.channel_inputs(Self::ARM).position_rad
    }

    pub fn target_radians(&self) -> Option<f64> {
        match self.controller.request(Self::ARM) {
            Some(ChannelRequest::Position(rad)) => Some(rad),
            _ => None,
        }
    }

    /// Under position control and within `tolerance` radians of the target.
    pub fn at_target(&self, tolerance: f64) -> bool {
        self.target_radians()
            .is_some_and(|target| (target - self.angle_radians()).abs() <= tolerance)
    }
}

pub fn set_pivot_target(radians: f64) -> Action {
    drive_position(MechanismId::Pivot, Pivot::ARM, radians).named("Pivot.set_pivot_target")
}

pub fn set_voltage(volts: f64) -> Action {
    drive_voltage(MechanismId::Pivot, Pivot::ARM, volts).named("Pivot.set_voltage")
}
