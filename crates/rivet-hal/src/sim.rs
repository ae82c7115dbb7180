//! In-process physics simulation backend.
//!
//! [`SimIo`] owns one [`Plant`] per actuator channel and one
//! [`SimBeamBreak`] per binary sensor.  Every
//! [`set_channel_command`][MechanismIo::set_channel_command] advances that
//! channel's plant by exactly one tick, so the next
//! [`read_inputs`][MechanismIo::read_inputs] reports state consistent with
//! the command history.
//!
//! # Plant models
//!
//! | Model | Dynamics |
//! |---|---|
//! | [`FlywheelModel`] | First-order DC motor: velocity relaxes toward `V/12 · free_speed` with time constant `τ`. |
//! | [`ArmModel`] | Single-jointed arm: `α = g·(V − back_emf − kG·cos θ)`, clamped at hard stops. |
//!
//! Current draw for both is `stall · (V − back_emf) / 12`, which makes a
//! stalled arm pushing into a hard stop trip the current interlock exactly
//! as hardware would.
//!
//! # Example
//!
//! ```rust
//! use rivet_hal::io::MechanismIo;
//! use rivet_hal::sim::{FlywheelModel, SimIo};
//! use rivet_types::{ChannelCommand, ChannelId};
//!
//! let mut io = SimIo::new("Shooter", 0.02)
//!     .with_plant(FlywheelModel::default())
//!     .with_beam_break();
//!
//! for _ in 0..50 {
//!     io.set_channel_command(ChannelId(0), ChannelCommand { volts: 6.0, feedforward_volts: 0.0 });
//! }
//! assert!(io.read_inputs().channels[0].velocity_rpm > 2500.0);
//! ```

use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rivet_types::{
    ChannelCommand, ChannelId, ChannelInputs, InputsSnapshot, NOMINAL_VOLTS, PidGains,
};

use crate::io::MechanismIo;

const RPM_PER_RAD_S: f64 = 60.0 / (2.0 * PI);

// ─────────────────────────────────────────────────────────────────────────────
// Plant trait
// ─────────────────────────────────────────────────────────────────────────────

/// A physical model of one actuator channel.
pub trait Plant: Send {
    /// Advance the model by `dt` seconds with `volts` applied.
    fn step(&mut self, volts: f64, dt: f64);

    /// Current model state as channel readings.
    fn inputs(&self) -> ChannelInputs;
}

/// Steady-state characteristics of a DC motor at [`NOMINAL_VOLTS`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcMotor {
    /// Output-shaft free speed in RPM, after gearing.
    pub free_speed_rpm: f64,
    /// Stall current in amps.
    pub stall_current_amps: f64,
}

impl DcMotor {
    fn back_emf(&self, velocity_rpm: f64) -> f64 {
        velocity_rpm / self.free_speed_rpm * NOMINAL_VOLTS
    }

    fn current(&self, volts: f64, velocity_rpm: f64) -> f64 {
        self.stall_current_amps * (volts - self.back_emf(velocity_rpm)) / NOMINAL_VOLTS
    }
}

impl Default for DcMotor {
    fn default() -> Self {
        Self {
            free_speed_rpm: 6000.0,
            stall_current_amps: 80.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flywheel
// ─────────────────────────────────────────────────────────────────────────────

/// Spinning mass driven by a DC motor (rollers, flywheels, winches).
#[derive(Debug, Clone, PartialEq)]
pub struct FlywheelModel {
    pub motor: DcMotor,
    /// Mechanical time constant in seconds.
    pub time_constant_s: f64,
    position_rad: f64,
    velocity_rpm: f64,
    applied_volts: f64,
    current_amps: f64,
}

impl FlywheelModel {
    pub fn new(motor: DcMotor, time_constant_s: f64) -> Self {
        Self {
            motor,
            time_constant_s,
            position_rad: 0.0,
            velocity_rpm: 0.0,
            applied_volts: 0.0,
            current_amps: 0.0,
        }
    }
}

impl Default for FlywheelModel {
    fn default() -> Self {
        Self::new(DcMotor::default(), 0.15)
    }
}

impl Plant for FlywheelModel {
    fn step(&mut self, volts: f64, dt: f64) {
        let volts = volts.clamp(-NOMINAL_VOLTS, NOMINAL_VOLTS);
        self.current_amps = self.motor.current(volts, self.velocity_rpm);
        let steady = volts / NOMINAL_VOLTS * self.motor.free_speed_rpm;
        let blend = (dt / self.time_constant_s).min(1.0);
        self.velocity_rpm += (steady - self.velocity_rpm) * blend;
        self.position_rad += self.velocity_rpm / RPM_PER_RAD_S * dt;
        self.applied_volts = volts;
    }

    fn inputs(&self) -> ChannelInputs {
        ChannelInputs {
            position_rad: self.position_rad,
            velocity_rpm: self.velocity_rpm,
            current_amps: self.current_amps,
            applied_volts: self.applied_volts,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Arm
// ─────────────────────────────────────────────────────────────────────────────

/// Single-jointed arm under gravity with hard stops at both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmModel {
    pub motor: DcMotor,
    /// Volts needed to hold the arm horizontal.
    pub gravity_volts: f64,
    /// Angular acceleration per net volt, rad/s².
    pub accel_per_volt: f64,
    pub min_angle_rad: f64,
    pub max_angle_rad: f64,
    angle_rad: f64,
    velocity_rad_s: f64,
    applied_volts: f64,
    current_amps: f64,
}

impl ArmModel {
    /// New arm resting at `start_angle_rad`.
    pub fn new(motor: DcMotor, gravity_volts: f64, accel_per_volt: f64, limits: (f64, f64), start_angle_rad: f64) -> Self {
        Self {
            motor,
            gravity_volts,
            accel_per_volt,
            min_angle_rad: limits.0,
            max_angle_rad: limits.1,
            angle_rad: start_angle_rad.clamp(limits.0, limits.1),
            velocity_rad_s: 0.0,
            applied_volts: 0.0,
            current_amps: 0.0,
        }
    }
}

impl Default for ArmModel {
    fn default() -> Self {
        let motor = DcMotor {
            free_speed_rpm: 60.0,
            stall_current_amps: 105.0,
        };
        Self::new(motor, 0.4, 20.0, (0.0, 2.0), 0.0)
    }
}

impl Plant for ArmModel {
    fn step(&mut self, volts: f64, dt: f64) {
        let volts = volts.clamp(-NOMINAL_VOLTS, NOMINAL_VOLTS);
        let velocity_rpm = self.velocity_rad_s * RPM_PER_RAD_S;
        let back_emf = self.motor.back_emf(velocity_rpm);
        self.current_amps = self.motor.current(volts, velocity_rpm);

        let net = volts - back_emf - self.gravity_volts * self.angle_rad.cos();
        self.velocity_rad_s += net * self.accel_per_volt * dt;
        self.angle_rad += self.velocity_rad_s * dt;

        if self.angle_rad <= self.min_angle_rad {
            self.angle_rad = self.min_angle_rad;
            self.velocity_rad_s = self.velocity_rad_s.max(0.0);
        } else if self.angle_rad >= self.max_angle_rad {
            self.angle_rad = self.max_angle_rad;
            self.velocity_rad_s = self.velocity_rad_s.min(0.0);
        }
        self.applied_volts = volts;
    }

    fn inputs(&self) -> ChannelInputs {
        ChannelInputs {
            position_rad: self.angle_rad,
            velocity_rpm: self.velocity_rad_s * RPM_PER_RAD_S,
            current_amps: self.current_amps,
            applied_volts: self.applied_volts,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Beam-break
// ─────────────────────────────────────────────────────────────────────────────

/// A simulated beam-break.  Clones share state, so a test or a game-piece
/// script can hold one handle while the backend reads another.
#[derive(Debug, Clone, Default)]
pub struct SimBeamBreak(Arc<AtomicBool>);

impl SimBeamBreak {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_obstructed(&self, obstructed: bool) {
        self.0.store(obstructed, Ordering::Release);
    }

    pub fn obstructed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SimIo
// ─────────────────────────────────────────────────────────────────────────────

/// Simulated backend for one mechanism.
pub struct SimIo {
    name: String,
    dt: f64,
    plants: Vec<Box<dyn Plant>>,
    sensors: Vec<SimBeamBreak>,
    gains: Vec<Option<PidGains>>,
}

impl SimIo {
    /// Empty backend stepping its plants by `dt` seconds per command.
    pub fn new(name: impl Into<String>, dt: f64) -> Self {
        Self {
            name: name.into(),
            dt,
            plants: Vec::new(),
            sensors: Vec::new(),
            gains: Vec::new(),
        }
    }

    /// Append a channel backed by `plant`.
    pub fn with_plant(mut self, plant: impl Plant + 'static) -> Self {
        self.plants.push(Box::new(plant));
        self.gains.push(None);
        self
    }

    /// Append a beam-break sensor.
    pub fn with_beam_break(mut self) -> Self {
        self.sensors.push(SimBeamBreak::new());
        self
    }

    /// Handle to sensor `index`, for scripts that move game pieces.
    pub fn beam_break(&self, index: usize) -> Option<SimBeamBreak> {
        self.sensors.get(index).cloned()
    }

    /// Last gains pushed to `channel`.
    pub fn gains(&self, channel: ChannelId) -> Option<PidGains> {
        self.gains.get(channel.0).copied().flatten()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MechanismIo for SimIo {
    fn kind(&self) -> &'static str {
        "sim"
    }

    fn read_inputs(&mut self) -> InputsSnapshot {
        InputsSnapshot {
            channels: self.plants.iter().map(|p| p.inputs()).collect(),
            sensors: self.sensors.iter().map(SimBeamBreak::obstructed).collect(),
            faults: Default::default(),
        }
    }

    fn set_channel_command(&mut self, channel: ChannelId, command: ChannelCommand) {
        if let Some(plant) = self.plants.get_mut(channel.0) {
            plant.step(command.volts, self.dt);
        }
    }

    fn configure_gains(&mut self, channel: ChannelId, gains: PidGains) {
        if let Some(slot) = self.gains.get_mut(channel.0) {
            *slot = Some(gains);
        }
    }
}
