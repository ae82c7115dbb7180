//! Climber: an open-loop winch.

use rivet_hal::io::MechanismIo;
use rivet_hal::sim::{DcMotor, FlywheelModel, SimIo};
use rivet_types::{ChannelId, ChannelRequest, MechanismId, NOMINAL_VOLTS};

use crate::action::Action;
use crate::mechanism::{ChannelSpec, ControlContext, FeedforwardModel, Mechanism, MechanismSpec};

pub struct Climber {
    controller: Mechanism,
}

impl Climber {
    pub const WINCH: ChannelId = ChannelId(0);

    pub const SPEC: MechanismSpec = MechanismSpec {
        channels: &[ChannelSpec {
            name: "Winch",
            gains: None,
            feedforward: FeedforwardModel::None,
        }],
        sensors: &[],
    };

    pub fn new(io: Box<dyn MechanismIo>, ctx: &ControlContext) -> Self {
        Self {
            controller: Mechanism::new(MechanismId::Climber, &Self::SPEC, io, ctx),
        }
    }

    pub fn sim_io(dt: f64) -> SimIo {
        let winch = DcMotor {
            free_speed_rpm: 5000.0,
            stall_current_amps: 70.0,
        };
        SimIo::new(MechanismId::Climber.name(), dt).with_plant(FlywheelModel::new(winch, 0.2))
    }

    pub fn controller(&self) -> &Mechanism {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Mechanism {
        &mut self.controller
    }

    /// Drive the winch at `duty` of nominal battery voltage, clamped to
    /// `[-1, 1]`.
    pub fn request_duty_cycle(&mut self, duty: f64) {
        let volts = duty.clamp(-1.0, 1.0) * NOMINAL_VOLTS;
        self.controller
            .set_request(Self::WINCH, ChannelRequest::Voltage(volts));
    }
}

pub fn set_duty_cycle(duty: f64) -> Action {
    Action::run("Climber.set_duty_cycle", [MechanismId::Climber], move |m| {
        m.climber.request_duty_cycle(duty)
    })
}
