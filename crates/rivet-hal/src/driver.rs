//! Device-level driver traits used by the live backend.
//!
//! [`LiveIo`][crate::live::LiveIo] owns one [`MotorDriver`] per actuator
//! channel and one [`BeamBreakDriver`] per binary sensor.  Vendor-specific
//! code (CAN motor controllers, digital inputs) implements these traits; the
//! rest of the stack only ever talks to [`MechanismIo`][crate::io::MechanismIo].

use rivet_types::{PidGains, RivetError};

/// One reading from a motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorReading {
    pub position_rad: f64,
    pub velocity_rpm: f64,
    pub current_amps: f64,
    pub applied_volts: f64,
}

impl MotorReading {
    /// `false` when any field is NaN or infinite.  Such a frame is treated
    /// as a failed read.
    pub fn is_finite(&self) -> bool {
        self.position_rad.is_finite()
            && self.velocity_rpm.is_finite()
            && self.current_amps.is_finite()
            && self.applied_volts.is_finite()
    }
}

/// A motor controller on the device bus.
pub trait MotorDriver: Send {
    /// Stable identifier, e.g. `"shooter_left"`.
    fn id(&self) -> &str;

    /// Poll the controller's latest telemetry frame.
    ///
    /// # Errors
    ///
    /// [`RivetError::HardwareFault`] for a missing or corrupt frame,
    /// [`RivetError::HardwareUnavailable`] when the device cannot be reached.
    fn read(&mut self) -> Result<MotorReading, RivetError>;

    /// Command an output voltage, with `feedforward_volts` as the share of it
    /// that is model feedforward.
    fn set_voltage(&mut self, volts: f64, feedforward_volts: f64) -> Result<(), RivetError>;

    /// Push gains to the controller's onboard loop.
    fn configure_pid(&mut self, gains: PidGains) -> Result<(), RivetError>;
}

/// A beam-break sensor wired to a digital input.
pub trait BeamBreakDriver: Send {
    fn id(&self) -> &str;

    /// `true` when an object blocks the light path.
    fn obstructed(&mut self) -> Result<bool, RivetError>;
}

/// Stand-in for a device that is not present on the bus.
///
/// Every call reports [`RivetError::HardwareUnavailable`], which makes the
/// owning live backend degrade to "hold zero".  Used when the process runs
/// in live mode on a machine with no device bus.
pub struct DisconnectedDriver {
    id: String,
}

impl DisconnectedDriver {
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self { id: id.into() })
    }

    fn unavailable(&self) -> RivetError {
        RivetError::HardwareUnavailable {
            component: self.id.clone(),
        }
    }
}

impl MotorDriver for DisconnectedDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self) -> Result<MotorReading, RivetError> {
        Err(self.unavailable())
    }

    fn set_voltage(&mut self, _volts: f64, _feedforward_volts: f64) -> Result<(), RivetError> {
        Err(self.unavailable())
    }

    fn configure_pid(&mut self, _gains: PidGains) -> Result<(), RivetError> {
        Err(self.unavailable())
    }
}

impl BeamBreakDriver for DisconnectedDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn obstructed(&mut self) -> Result<bool, RivetError> {
        Err(self.unavailable())
    }
}
