//! `rivet-types` – shared data model for the Rivet control stack.
//!
//! Every crate in the workspace speaks these types: the execution mode chosen
//! at startup, mechanism and channel identifiers, the per-tick
//! [`InputsSnapshot`] a hardware backend returns, the [`ChannelCommand`] it
//! receives, controller gains, telemetry records and the bus [`Event`]
//! envelope.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Nominal battery voltage used to scale duty cycles and clamp commands.
pub const NOMINAL_VOLTS: f64 = 12.0;

// ─────────────────────────────────────────────────────────────────────────────
// Execution mode
// ─────────────────────────────────────────────────────────────────────────────

/// Which hardware backend family is wired for every mechanism.
///
/// Selected exactly once at process start and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Physical hardware.
    Live,
    /// In-process physics simulation.
    #[default]
    Simulated,
    /// Recorded log playback with all actuation disabled.
    Replay,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Live => write!(f, "live"),
            ExecutionMode::Simulated => write!(f, "simulated"),
            ExecutionMode::Replay => write!(f, "replay"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = RivetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" | "real" => Ok(ExecutionMode::Live),
            "sim" | "simulated" => Ok(ExecutionMode::Simulated),
            "replay" => Ok(ExecutionMode::Replay),
            other => Err(RivetError::Config(format!("unknown execution mode '{other}'"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// One independently actuated subsystem of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MechanismId {
    Intake,
    Feeder,
    Shooter,
    Pivot,
    Climber,
    /// The drivetrain; owned by an external collaborator.
    Drive,
}

impl MechanismId {
    /// Every mechanism, in the fixed order the control loop services them.
    pub const ALL: [MechanismId; 6] = [
        MechanismId::Intake,
        MechanismId::Feeder,
        MechanismId::Shooter,
        MechanismId::Pivot,
        MechanismId::Climber,
        MechanismId::Drive,
    ];

    /// Stable name used for telemetry keys and tunable-parameter prefixes.
    pub fn name(self) -> &'static str {
        match self {
            MechanismId::Intake => "Intake",
            MechanismId::Feeder => "Feeder",
            MechanismId::Shooter => "Shooter",
            MechanismId::Pivot => "Pivot",
            MechanismId::Climber => "Climber",
            MechanismId::Drive => "Drive",
        }
    }
}

impl fmt::Display for MechanismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Index of an actuator channel within its mechanism's channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub usize);

// ─────────────────────────────────────────────────────────────────────────────
// Backend inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Readings for a single actuator channel as of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelInputs {
    /// Position in radians.
    pub position_rad: f64,
    /// Velocity in RPM.
    pub velocity_rpm: f64,
    /// Current draw in amps.
    pub current_amps: f64,
    /// Voltage the backend reports as applied.
    pub applied_volts: f64,
}

/// Fault bits reported alongside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FaultFlags {
    /// At least one reading this tick is a held copy of an earlier tick.
    pub stale: bool,
    /// Reads have been failing for long enough to be considered persistent.
    pub read_fault: bool,
    /// The backend cannot reach its hardware; the mechanism holds zero.
    pub backend_unavailable: bool,
}

impl FaultFlags {
    /// `true` when any bit is set.
    pub fn any(&self) -> bool {
        self.stale || self.read_fault || self.backend_unavailable
    }
}

/// Everything a backend reports for one tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputsSnapshot {
    pub channels: Vec<ChannelInputs>,
    /// Beam-break states, `true` = obstructed.
    pub sensors: Vec<bool>,
    #[serde(default)]
    pub faults: FaultFlags,
}

impl InputsSnapshot {
    /// An all-zero snapshot sized for `channels` channels and `sensors` sensors.
    pub fn zeroed(channels: usize, sensors: usize) -> Self {
        Self {
            channels: vec![ChannelInputs::default(); channels],
            sensors: vec![false; sensors],
            faults: FaultFlags::default(),
        }
    }

    /// Readings for `channel`; an unknown channel reads as all zeros.
    pub fn channel(&self, channel: ChannelId) -> ChannelInputs {
        self.channels.get(channel.0).copied().unwrap_or_default()
    }

    /// State of sensor `index`; an unknown sensor reads as clear.
    pub fn sensor(&self, index: usize) -> bool {
        self.sensors.get(index).copied().unwrap_or(false)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands and gains
// ─────────────────────────────────────────────────────────────────────────────

/// The output a mechanism controller hands to its backend for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelCommand {
    /// Final voltage to apply (feedback + feedforward, after interlocks).
    pub volts: f64,
    /// The feedforward share of `volts`, for backends that close the loop
    /// in hardware and want it as an arbitrary feedforward term.
    pub feedforward_volts: f64,
}

impl ChannelCommand {
    pub const ZERO: ChannelCommand = ChannelCommand {
        volts: 0.0,
        feedforward_volts: 0.0,
    };
}

/// Proportional, integral and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// Feedforward coefficients. `kg` is ignored by models without gravity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedforwardGains {
    pub ks: f64,
    pub kg: f64,
    pub kv: f64,
    pub ka: f64,
}

/// What an action asked a channel to do.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value")]
pub enum ChannelRequest {
    /// Open-loop voltage.
    Voltage(f64),
    /// Closed-loop velocity setpoint in RPM.
    Velocity(f64),
    /// Closed-loop position setpoint in radians.
    Position(f64),
}

impl ChannelRequest {
    /// The setpoint of a closed-loop request, `None` for open-loop voltage.
    pub fn target(&self) -> Option<f64> {
        match self {
            ChannelRequest::Voltage(_) => None,
            ChannelRequest::Velocity(rpm) => Some(*rpm),
            ChannelRequest::Position(rad) => Some(*rad),
        }
    }

    /// `true` when both requests use the same control mode.
    pub fn same_mode(&self, other: &ChannelRequest) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Telemetry
// ─────────────────────────────────────────────────────────────────────────────

/// Per-channel part of a [`MechanismTelemetry`] record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTelemetry {
    pub name: String,
    pub inputs: ChannelInputs,
    pub request: Option<ChannelRequest>,
    pub applied_volts: f64,
    /// The current interlock forced this channel to zero this tick.
    pub interlocked: bool,
}

/// Named beam-break state in a telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorTelemetry {
    pub name: String,
    pub obstructed: bool,
}

/// Structured record every mechanism publishes once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanismTelemetry {
    pub tick: u64,
    pub mechanism: String,
    pub channels: Vec<ChannelTelemetry>,
    pub sensors: Vec<SensorTelemetry>,
    pub faults: FaultFlags,
}

// ─────────────────────────────────────────────────────────────────────────────
// Bus events
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle transition of a scheduled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionPhase {
    Started,
    Finished,
    Interrupted,
}

/// Unified event wrapper for the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"rivet-runtime::robot"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` with a fresh id and the current timestamp.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Telemetry(MechanismTelemetry),
    HardwareFault {
        component: String,
        code: u32,
        message: String,
    },
    /// The current interlock engaged (`engaged = true`) or released.
    Interlock {
        mechanism: String,
        channel: String,
        current_amps: f64,
        engaged: bool,
    },
    ActionLifecycle {
        name: String,
        phase: ActionPhase,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning hardware failures, configuration problems and
/// bus plumbing.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RivetError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Hardware Unavailable: {component}")]
    HardwareUnavailable { component: String },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}
