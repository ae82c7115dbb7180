//! [`Mechanism`] – the controller every subsystem is built on.
//!
//! A mechanism owns exactly one [`MechanismIo`] backend for its lifetime and
//! runs the same two-phase tick whatever that backend is:
//!
//! 1. [`refresh`][Mechanism::refresh] reads the backend once.  That snapshot
//!    is the only state actions see for the rest of the tick.
//! 2. [`apply`][Mechanism::apply] turns every channel's request into a
//!    [`ChannelCommand`] and hands it to the backend.
//!
//! # Command resolution
//!
//! | Request | Command |
//! |---|---|
//! | none yet | 0 V |
//! | [`Voltage(v)`][ChannelRequest::Voltage] | `v` |
//! | [`Velocity(rpm)`][ChannelRequest::Velocity] | `pid(rpm, measured rpm) + kS·sign(rpm) + kV·rpm` |
//! | [`Position(θ)`][ChannelRequest::Position] | `pid(θ, measured θ) + kG·cos(θ)` for arms |
//!
//! A request stays in force until replaced, so a channel nobody is driving
//! keeps doing the last thing it was asked.  Closed-loop requests stay under
//! regulation with the gains live in the registry *this* tick.
//!
//! Two conditions override the result with exactly 0 V and reset the
//! feedback state: the channel's current is over the mechanism's limit, or
//! the backend reports itself unavailable.  Both clear on their own.  A
//! command that comes out NaN or infinite is also replaced with 0 V and the
//! feedback state reset, so one bad frame cannot stick in the integral.

use std::sync::Arc;
use std::time::Duration;

use rivet_hal::feedforward::{ArmFeedforward, SimpleMotorFeedforward};
use rivet_hal::io::MechanismIo;
use rivet_hal::pid::PidController;
use rivet_kernel::interlock::{CurrentInterlock, InterlockVerdict, SafetyLimits};
use rivet_kernel::tunable::{TunableNumber, TunableRegistry};
use rivet_types::{
    ChannelCommand, ChannelId, ChannelInputs, ChannelRequest, ChannelTelemetry, EventPayload,
    FaultFlags, FeedforwardGains, InputsSnapshot, MechanismId, MechanismTelemetry, NOMINAL_VOLTS,
    PidGains, SensorTelemetry,
};
use tracing::{debug, info, warn};

use crate::action::Action;

/// Alert code for a persistent read fault.
pub const FAULT_CODE_READ: u32 = 1;
/// Alert code for an unreachable backend.
pub const FAULT_CODE_UNAVAILABLE: u32 = 2;

// ─────────────────────────────────────────────────────────────────────────────
// Static layout
// ─────────────────────────────────────────────────────────────────────────────

/// Which feedforward model a channel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedforwardModel {
    /// Open-loop only; no feedforward.
    None,
    /// Rollers and flywheels.
    SimpleMotor,
    /// Pivoting arms.
    Arm,
}

/// One actuator channel of a mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: &'static str,
    /// Tunable group holding this channel's gains, e.g. `"Shooter/Flywheel"`.
    /// `None` for voltage-only channels.
    pub gains: Option<&'static str>,
    pub feedforward: FeedforwardModel,
}

/// Channel and sensor layout of a mechanism.  Channel `i` is
/// [`ChannelId(i)`][ChannelId].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MechanismSpec {
    pub channels: &'static [ChannelSpec],
    pub sensors: &'static [&'static str],
}

/// Everything a mechanism needs from the robot it lives in.
#[derive(Debug, Clone)]
pub struct ControlContext {
    pub registry: Arc<TunableRegistry>,
    /// Control period.
    pub period: Duration,
    /// Symmetric command clamp.
    pub max_volts: f64,
    pub limits: SafetyLimits,
}

impl ControlContext {
    /// 20 ms period, 12 V clamp, built-in safety limits.
    pub fn new(registry: Arc<TunableRegistry>) -> Self {
        Self {
            registry,
            period: Duration::from_millis(20),
            max_volts: NOMINAL_VOLTS,
            limits: SafetyLimits::builtin(),
        }
    }

    pub fn dt(&self) -> f64 {
        self.period.as_secs_f64()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-channel state
// ─────────────────────────────────────────────────────────────────────────────

/// Registry handles for one channel's gain group.
struct GainKeys {
    kp: TunableNumber,
    ki: TunableNumber,
    kd: TunableNumber,
    ks: TunableNumber,
    kg: TunableNumber,
    kv: TunableNumber,
    ka: TunableNumber,
}

impl GainKeys {
    fn new(group: &str, registry: &Arc<TunableRegistry>) -> Self {
        let number = |coef: &str| registry.number(format!("{group}/{coef}"));
        Self {
            kp: number("kP"),
            ki: number("kI"),
            kd: number("kD"),
            ks: number("kS"),
            kg: number("kG"),
            kv: number("kV"),
            ka: number("kA"),
        }
    }

    fn read(&self) -> (PidGains, FeedforwardGains) {
        (
            PidGains {
                kp: self.kp.get(),
                ki: self.ki.get(),
                kd: self.kd.get(),
            },
            FeedforwardGains {
                ks: self.ks.get(),
                kg: self.kg.get(),
                kv: self.kv.get(),
                ka: self.ka.get(),
            },
        )
    }
}

struct Channel {
    spec: ChannelSpec,
    keys: Option<GainKeys>,
    pid: PidController,
    request: Option<ChannelRequest>,
    pushed: Option<PidGains>,
    applied: ChannelCommand,
    interlocked: bool,
}

impl Channel {
    fn new(spec: ChannelSpec, registry: &Arc<TunableRegistry>, max_volts: f64) -> Self {
        let mut pid = PidController::new(PidGains::default());
        pid.set_output_limits(-max_volts, max_volts);
        Self {
            spec,
            keys: spec.gains.map(|group| GainKeys::new(group, registry)),
            pid,
            request: None,
            pushed: None,
            applied: ChannelCommand::ZERO,
            interlocked: false,
        }
    }

    fn compute(
        &mut self,
        measured: ChannelInputs,
        ff: FeedforwardGains,
        dt: f64,
        max_volts: f64,
    ) -> ChannelCommand {
        let (volts, feedforward_volts) = match self.request {
            None => (0.0, 0.0),
            Some(ChannelRequest::Voltage(v)) => (v, 0.0),
            Some(ChannelRequest::Velocity(rpm)) => {
                self.pid.set_set_point(rpm);
                let feedback = self.pid.update(measured.velocity_rpm, dt);
                let feedforward = match self.spec.feedforward {
                    FeedforwardModel::None => 0.0,
                    FeedforwardModel::SimpleMotor => {
                        SimpleMotorFeedforward::from_gains(&ff).calculate(rpm, 0.0)
                    }
                    FeedforwardModel::Arm => {
                        ArmFeedforward::from_gains(&ff).calculate(measured.position_rad, rpm, 0.0)
                    }
                };
                (feedback + feedforward, feedforward)
            }
            Some(ChannelRequest::Position(rad)) => {
                self.pid.set_set_point(rad);
                let feedback = self.pid.update(measured.position_rad, dt);
                let feedforward = match self.spec.feedforward {
                    FeedforwardModel::Arm => ArmFeedforward::from_gains(&ff).calculate(rad, 0.0, 0.0),
                    FeedforwardModel::None | FeedforwardModel::SimpleMotor => 0.0,
                };
                (feedback + feedforward, feedforward)
            }
        };
        if !(volts.is_finite() && feedforward_volts.is_finite()) {
            warn!(channel = self.spec.name, request = ?self.request, "non-finite command; zeroing and resetting feedback");
            self.pid.reset();
            return ChannelCommand::ZERO;
        }
        ChannelCommand {
            volts: volts.clamp(-max_volts, max_volts),
            feedforward_volts: feedforward_volts.clamp(-max_volts, max_volts),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mechanism
// ─────────────────────────────────────────────────────────────────────────────

/// Closed-loop controller for one mechanism.
pub struct Mechanism {
    id: MechanismId,
    io: Box<dyn MechanismIo>,
    channels: Vec<Channel>,
    sensor_names: &'static [&'static str],
    interlock: CurrentInterlock,
    inputs: InputsSnapshot,
    faults: FaultFlags,
    alerts: Vec<EventPayload>,
    dt: f64,
    max_volts: f64,
    tick: u64,
}

impl Mechanism {
    pub fn new(
        id: MechanismId,
        spec: &MechanismSpec,
        io: Box<dyn MechanismIo>,
        ctx: &ControlContext,
    ) -> Self {
        info!(mechanism = %id, backend = io.kind(), "mechanism online");
        Self {
            id,
            io,
            channels: spec
                .channels
                .iter()
                .map(|c| Channel::new(*c, &ctx.registry, ctx.max_volts))
                .collect(),
            sensor_names: spec.sensors,
            interlock: CurrentInterlock::new(id, spec.channels.len(), &ctx.limits),
            inputs: InputsSnapshot::zeroed(spec.channels.len(), spec.sensors.len()),
            faults: FaultFlags::default(),
            alerts: Vec::new(),
            dt: ctx.dt(),
            max_volts: ctx.max_volts,
            tick: 0,
        }
    }

    pub fn id(&self) -> MechanismId {
        self.id
    }

    /// Kind of the backend this mechanism was built with.
    pub fn backend_kind(&self) -> &'static str {
        self.io.kind()
    }

    /// Read the backend.  Call once per tick before any action runs.
    pub fn refresh(&mut self) {
        self.tick += 1;
        let inputs = self.io.read_inputs();
        self.note_fault_edges(inputs.faults);
        self.inputs = inputs;
    }

    /// This tick's snapshot.
    pub fn inputs(&self) -> &InputsSnapshot {
        &self.inputs
    }

    pub fn channel_inputs(&self, channel: ChannelId) -> ChannelInputs {
        self.inputs.channel(channel)
    }

    pub fn sensor(&self, index: usize) -> bool {
        self.inputs.sensor(index)
    }

    /// Replace `channel`'s request.  Takes effect at the next
    /// [`apply`][Self::apply].
    pub fn set_request(&mut self, channel: ChannelId, request: ChannelRequest) {
        let Some(ch) = self.channels.get_mut(channel.0) else {
            debug!(mechanism = %self.id, channel = channel.0, "request for unknown channel ignored");
            return;
        };
        if ch.request.is_some_and(|prev| !prev.same_mode(&request)) {
            ch.pid.reset();
        }
        ch.request = Some(request);
    }

    /// The request in force for `channel`.
    pub fn request(&self, channel: ChannelId) -> Option<ChannelRequest> {
        self.channels.get(channel.0).and_then(|c| c.request)
    }

    /// Request 0 V on `channel`.
    pub fn stop(&mut self, channel: ChannelId) {
        self.set_request(channel, ChannelRequest::Voltage(0.0));
    }

    /// Request 0 V on every channel.
    pub fn stop_all(&mut self) {
        for index in 0..self.channels.len() {
            self.stop(ChannelId(index));
        }
    }

    /// Command sent to `channel` by the last [`apply`][Self::apply].
    pub fn applied(&self, channel: ChannelId) -> ChannelCommand {
        self.channels
            .get(channel.0)
            .map(|c| c.applied)
            .unwrap_or(ChannelCommand::ZERO)
    }

    /// Whether the interlock zeroed `channel` in the last tick.
    pub fn is_interlocked(&self, channel: ChannelId) -> bool {
        self.channels.get(channel.0).is_some_and(|c| c.interlocked)
    }

    /// Compute every channel's command and send it to the backend.
    pub fn apply(&mut self) {
        let unavailable = self.inputs.faults.backend_unavailable;
        for (index, ch) in self.channels.iter_mut().enumerate() {
            let id = ChannelId(index);
            let measured = self.inputs.channel(id);

            let verdict = self.interlock.check(index, measured.current_amps);
            if matches!(verdict, InterlockVerdict::Engaged | InterlockVerdict::Released) {
                self.alerts.push(EventPayload::Interlock {
                    mechanism: self.id.name().to_string(),
                    channel: ch.spec.name.to_string(),
                    current_amps: measured.current_amps,
                    engaged: verdict == InterlockVerdict::Engaged,
                });
            }

            let (gains, ff) = match &ch.keys {
                Some(keys) => keys.read(),
                None => Default::default(),
            };
            if ch.keys.is_some() && ch.pushed != Some(gains) {
                self.io.configure_gains(id, gains);
                ch.pushed = Some(gains);
            }
            ch.pid.set_gains(gains);

            let command = if verdict.trips() || unavailable {
                ch.pid.reset();
                ChannelCommand::ZERO
            } else {
                ch.compute(measured, ff, self.dt, self.max_volts)
            };
            ch.interlocked = verdict.trips();
            ch.applied = command;
            self.io.set_channel_command(id, command);
        }
    }

    /// Structured record of the current tick.
    pub fn telemetry(&self) -> MechanismTelemetry {
        MechanismTelemetry {
            tick: self.tick,
            mechanism: self.id.name().to_string(),
            channels: self
                .channels
                .iter()
                .enumerate()
                .map(|(i, c)| ChannelTelemetry {
                    name: c.spec.name.to_string(),
                    inputs: self.inputs.channel(ChannelId(i)),
                    request: c.request,
                    applied_volts: c.applied.volts,
                    interlocked: c.interlocked,
                })
                .collect(),
            sensors: self
                .sensor_names
                .iter()
                .enumerate()
                .map(|(i, name)| SensorTelemetry {
                    name: name.to_string(),
                    obstructed: self.inputs.sensor(i),
                })
                .collect(),
            faults: self.inputs.faults,
        }
    }

    /// Alerts raised since the last call.
    pub fn take_alerts(&mut self) -> Vec<EventPayload> {
        std::mem::take(&mut self.alerts)
    }

    fn note_fault_edges(&mut self, faults: FaultFlags) {
        let prev = self.faults;
        if faults.read_fault && !prev.read_fault {
            warn!(mechanism = %self.id, "persistent read fault");
            self.alerts.push(EventPayload::HardwareFault {
                component: self.id.name().to_string(),
                code: FAULT_CODE_READ,
                message: "sensor reads failing; holding last values".to_string(),
            });
        }
        if faults.backend_unavailable && !prev.backend_unavailable {
            warn!(mechanism = %self.id, "backend unavailable; holding zero");
            self.alerts.push(EventPayload::HardwareFault {
                component: self.id.name().to_string(),
                code: FAULT_CODE_UNAVAILABLE,
                message: "hardware unreachable; outputs held at zero".to_string(),
            });
        }
        if (prev.read_fault || prev.backend_unavailable)
            && !(faults.read_fault || faults.backend_unavailable)
        {
            info!(mechanism = %self.id, "faults cleared");
        }
        if faults.stale {
            debug!(mechanism = %self.id, tick = self.tick, "stale readings held");
        }
        self.faults = faults;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generic channel actions
// ─────────────────────────────────────────────────────────────────────────────

/// Hold `channel` of `mechanism` at `rad`.  Runs until interrupted.
pub fn drive_position(mechanism: MechanismId, channel: ChannelId, rad: f64) -> Action {
    Action::run(format!("{mechanism}.position"), [mechanism], move |m| {
        if let Some(c) = m.controller_mut(mechanism) {
            c.set_request(channel, ChannelRequest::Position(rad));
        }
    })
}

/// Spin `channel` of `mechanism` at `rpm`.  Runs until interrupted.
pub fn drive_velocity(mechanism: MechanismId, channel: ChannelId, rpm: f64) -> Action {
    Action::run(format!("{mechanism}.velocity"), [mechanism], move |m| {
        if let Some(c) = m.controller_mut(mechanism) {
            c.set_request(channel, ChannelRequest::Velocity(rpm));
        }
    })
}

/// Spin a paired set of channels: `primary` at `rpm`, `secondary` at
/// `rpm × differential`.  Runs until interrupted.
pub fn drive_velocity_pair(
    mechanism: MechanismId,
    primary: ChannelId,
    secondary: ChannelId,
    rpm: f64,
    differential: f64,
) -> Action {
    Action::run(format!("{mechanism}.velocity_pair"), [mechanism], move |m| {
        if let Some(c) = m.controller_mut(mechanism) {
            c.set_request(primary, ChannelRequest::Velocity(rpm));
            c.set_request(secondary, ChannelRequest::Velocity(rpm * differential));
        }
    })
}

/// Apply `volts` open-loop.  Runs until interrupted.
pub fn drive_voltage(mechanism: MechanismId, channel: ChannelId, volts: f64) -> Action {
    Action::run(format!("{mechanism}.voltage"), [mechanism], move |m| {
        if let Some(c) = m.controller_mut(mechanism) {
            c.set_request(channel, ChannelRequest::Voltage(volts));
        }
    })
}

/// Request 0 V once and finish.
pub fn stop_channel(mechanism: MechanismId, channel: ChannelId) -> Action {
    Action::instant(format!("{mechanism}.stop"), [mechanism], move |m| {
        if let Some(c) = m.controller_mut(mechanism) {
            c.stop(channel);
        }
    })
}
