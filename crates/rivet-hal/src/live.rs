//! [`LiveIo`] – backend that talks to physical device drivers.
//!
//! # Failure policy
//!
//! | Condition | Behaviour |
//! |---|---|
//! | One read fails or returns a NaN/infinite field | The previous reading is held and `faults.stale` is set for the tick. |
//! | Reads fail for [`FAULT_PERSIST_TICKS`] ticks in a row | `faults.read_fault` is raised until a clean tick. |
//! | A driver reports [`RivetError::HardwareUnavailable`] | Every channel is driven to zero and `faults.backend_unavailable` stays raised until all drivers answer again. |
//!
//! No method panics or returns an error to the caller.

use rivet_types::{
    ChannelCommand, ChannelId, ChannelInputs, InputsSnapshot, PidGains, RivetError,
};
use tracing::{debug, info, warn};

use crate::driver::{BeamBreakDriver, MotorDriver, MotorReading};
use crate::io::MechanismIo;

/// Consecutive failed ticks before a read fault is considered persistent.
pub const FAULT_PERSIST_TICKS: u32 = 5;

impl From<MotorReading> for ChannelInputs {
    fn from(r: MotorReading) -> Self {
        ChannelInputs {
            position_rad: r.position_rad,
            velocity_rpm: r.velocity_rpm,
            current_amps: r.current_amps,
            applied_volts: r.applied_volts,
        }
    }
}

/// Live hardware backend for one mechanism.
pub struct LiveIo {
    name: String,
    motors: Vec<Box<dyn MotorDriver>>,
    sensors: Vec<Box<dyn BeamBreakDriver>>,
    last: InputsSnapshot,
    pushed_gains: Vec<Option<PidGains>>,
    consecutive_failures: u32,
    unavailable: bool,
}

impl LiveIo {
    /// Build a backend for mechanism `name`.  Channel `i` of the mechanism
    /// maps to `motors[i]`, sensor `j` to `sensors[j]`.
    pub fn new(
        name: impl Into<String>,
        motors: Vec<Box<dyn MotorDriver>>,
        sensors: Vec<Box<dyn BeamBreakDriver>>,
    ) -> Self {
        let last = InputsSnapshot::zeroed(motors.len(), sensors.len());
        let pushed_gains = vec![None; motors.len()];
        Self {
            name: name.into(),
            motors,
            sensors,
            last,
            pushed_gains,
            consecutive_failures: 0,
            unavailable: false,
        }
    }

    fn mark_unavailable(&mut self, component: &str) {
        if !self.unavailable {
            warn!(
                mechanism = %self.name,
                component,
                "hardware unavailable; holding zero"
            );
        }
        self.unavailable = true;
    }

    fn drive_all_to_zero(&mut self) {
        for motor in &mut self.motors {
            // Best effort: an unreachable device is already at rest.
            let _ = motor.set_voltage(0.0, 0.0);
        }
    }
}

impl MechanismIo for LiveIo {
    fn kind(&self) -> &'static str {
        "live"
    }

    fn read_inputs(&mut self) -> InputsSnapshot {
        let mut snapshot = self.last.clone();
        snapshot.faults = Default::default();
        let mut failed = false;
        let mut unreachable: Option<String> = None;

        for (i, motor) in self.motors.iter_mut().enumerate() {
            match motor.read() {
                Ok(reading) if reading.is_finite() => snapshot.channels[i] = reading.into(),
                Ok(reading) => {
                    failed = true;
                    debug!(mechanism = %self.name, motor = motor.id(), ?reading, "non-finite frame; holding last value");
                }
                Err(RivetError::HardwareUnavailable { component }) => {
                    failed = true;
                    unreachable.get_or_insert(component);
                }
                Err(e) => {
                    failed = true;
                    debug!(mechanism = %self.name, motor = motor.id(), error = %e, "motor read failed; holding last value");
                }
            }
        }
        for (j, sensor) in self.sensors.iter_mut().enumerate() {
            match sensor.obstructed() {
                Ok(obstructed) => snapshot.sensors[j] = obstructed,
                Err(RivetError::HardwareUnavailable { component }) => {
                    failed = true;
                    unreachable.get_or_insert(component);
                }
                Err(e) => {
                    failed = true;
                    debug!(mechanism = %self.name, sensor = sensor.id(), error = %e, "sensor read failed; holding last value");
                }
            }
        }

        if let Some(component) = unreachable {
            self.mark_unavailable(&component);
        } else if !failed && self.unavailable {
            info!(mechanism = %self.name, "hardware reachable again");
            self.unavailable = false;
        }

        if failed {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            if self.consecutive_failures == FAULT_PERSIST_TICKS {
                warn!(mechanism = %self.name, ticks = FAULT_PERSIST_TICKS, "persistent read fault");
            }
        } else {
            self.consecutive_failures = 0;
        }

        snapshot.faults.stale = failed;
        snapshot.faults.read_fault = self.consecutive_failures >= FAULT_PERSIST_TICKS;
        snapshot.faults.backend_unavailable = self.unavailable;
        self.last = snapshot.clone();
        snapshot
    }

    fn set_channel_command(&mut self, channel: ChannelId, command: ChannelCommand) {
        if self.unavailable {
            self.drive_all_to_zero();
            return;
        }
        let Some(motor) = self.motors.get_mut(channel.0) else {
            debug!(mechanism = %self.name, channel = channel.0, "command for unknown channel ignored");
            return;
        };
        match motor.set_voltage(command.volts, command.feedforward_volts) {
            Ok(()) => {}
            Err(RivetError::HardwareUnavailable { component }) => {
                self.mark_unavailable(&component);
                self.drive_all_to_zero();
            }
            Err(e) => {
                debug!(mechanism = %self.name, motor = motor.id(), error = %e, "command rejected; zeroing channel");
                let _ = motor.set_voltage(0.0, 0.0);
            }
        }
    }

    fn configure_gains(&mut self, channel: ChannelId, gains: PidGains) {
        let Some(slot) = self.pushed_gains.get_mut(channel.0) else {
            return;
        };
        if *slot == Some(gains) {
            return;
        }
        if let Some(motor) = self.motors.get_mut(channel.0) {
            match motor.configure_pid(gains) {
                Ok(()) => *slot = Some(gains),
                Err(e) => {
                    debug!(mechanism = %self.name, motor = motor.id(), error = %e, "gain push failed; will retry");
                }
            }
        }
    }
}
