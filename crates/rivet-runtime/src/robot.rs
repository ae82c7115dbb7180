//! [`Robot`] – the fixed-rate control loop.
//!
//! One call to [`Robot::tick`] is one control period:
//!
//! | Step | What happens |
//! |---|---|
//! | 1 | Staged tunable writes are committed ([`TunableRegistry::begin_tick`]) |
//! | 2 | Every backend is read once |
//! | 3 | Triggers are polled; their actions are scheduled |
//! | 4 | The scheduler steps every running action, then starts free defaults |
//! | 5 | Every channel's command is computed and sent |
//! | 6 | Telemetry, alerts and action transitions are published on the bus |
//!
//! Nothing in a tick blocks or waits on a subscriber.
//!
//! # Example
//!
//! ```rust
//! use rivet_runtime::robot::{Robot, RobotConfig};
//!
//! let mut robot = Robot::new(RobotConfig::default())?;
//! robot.schedule_named("ShootNoteTimed")?;
//! for _ in 0..10 {
//!     robot.tick();
//! }
//! assert_eq!(robot.tick_count(), 10);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rivet_kernel::defaults::ParameterTable;
use rivet_kernel::interlock::SafetyLimits;
use rivet_kernel::tunable::TunableRegistry;
use rivet_middleware::bus::{self, EventBus, Topic};
use rivet_types::{ActionPhase, Event, EventPayload, ExecutionMode, MechanismId, NOMINAL_VOLTS, RivetError};
use tracing::{debug, info};

use crate::action::{Action, CompositionError};
use crate::mechanism::ControlContext;
use crate::named::ActionRegistry;
use crate::routines::register_stock;
use crate::scheduler::{ActionHandle, Scheduler};
use crate::subsystems::{Backends, Mechanisms};
use crate::trigger::{Trigger, Triggers};

/// `source` of every event the loop publishes.
pub const EVENT_SOURCE: &str = "rivet-runtime::robot";

/// Everything fixed at startup.
#[derive(Debug, Clone)]
pub struct RobotConfig {
    pub mode: ExecutionMode,
    pub period: Duration,
    pub max_volts: f64,
    pub limits: SafetyLimits,
    /// Per-mode tunable defaults.
    pub parameters: ParameterTable,
    /// Directory of `<Mechanism>.jsonl` logs, replay mode only.
    pub replay_dir: Option<PathBuf>,
    pub bus_capacity: usize,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Simulated,
            period: Duration::from_millis(20),
            max_volts: NOMINAL_VOLTS,
            limits: SafetyLimits::builtin(),
            parameters: ParameterTable::builtin(),
            replay_dir: None,
            bus_capacity: bus::DEFAULT_CAPACITY.get(),
        }
    }
}

pub struct Robot {
    mode: ExecutionMode,
    period: Duration,
    registry: Arc<TunableRegistry>,
    mechanisms: Mechanisms,
    scheduler: Scheduler,
    triggers: Triggers,
    actions: ActionRegistry,
    bus: EventBus,
    tick: u64,
}

impl Robot {
    /// Wire backends for `config.mode` and build the robot.
    ///
    /// # Errors
    ///
    /// Backend setup errors (unreadable replay logs), a zero bus capacity, or
    /// [`RivetError::Config`] if a stock routine fails to compose.
    pub fn new(config: RobotConfig) -> Result<Self, RivetError> {
        let backends = Backends::for_mode(config.mode, config.period, config.replay_dir.as_deref())?;
        Self::with_backends(&config, backends)
    }

    /// Build the robot around caller-supplied backends.
    pub fn with_backends(config: &RobotConfig, backends: Backends) -> Result<Self, RivetError> {
        let registry = Arc::new(TunableRegistry::new(config.parameters.resolve(config.mode)));
        let ctx = ControlContext {
            registry: Arc::clone(&registry),
            period: config.period,
            max_volts: config.max_volts,
            limits: config.limits.clone(),
        };
        let mut actions = ActionRegistry::new();
        register_stock(&mut actions, config.period)
            .map_err(|e| RivetError::Config(format!("stock routine: {e}")))?;
        let bus = EventBus::new(config.bus_capacity)?;

        info!(
            mode = %config.mode,
            period_ms = config.period.as_millis() as u64,
            "robot initialised"
        );
        Ok(Self {
            mode: config.mode,
            period: config.period,
            registry,
            mechanisms: Mechanisms::new(backends, &ctx),
            scheduler: Scheduler::new(),
            triggers: Triggers::new(),
            actions,
            bus,
            tick: 0,
        })
    }

    /// Run one control period.
    pub fn tick(&mut self) {
        self.tick += 1;
        let committed = self.registry.begin_tick();
        if committed > 0 {
            debug!(tick = self.tick, committed, "tunable values committed");
        }

        self.mechanisms.refresh_all();
        for action in self.triggers.poll(&self.mechanisms) {
            self.scheduler.schedule(action, &mut self.mechanisms);
        }
        self.scheduler.step(&mut self.mechanisms);
        self.mechanisms.apply_all();

        self.publish();
    }

    fn publish(&mut self) {
        for record in self.mechanisms.telemetry() {
            self.bus.publish_to(
                Topic::Telemetry,
                Event::new(EVENT_SOURCE, EventPayload::Telemetry(record)),
            );
        }
        for alert in self.mechanisms.take_alerts() {
            self.bus
                .publish_to(Topic::SystemAlerts, Event::new(EVENT_SOURCE, alert));
        }
        for (name, phase) in self.scheduler.take_events() {
            if phase != ActionPhase::Started {
                info!(action = %name, ?phase, "action ended");
            }
            self.bus.publish_to(
                Topic::Actions,
                Event::new(EVENT_SOURCE, EventPayload::ActionLifecycle { name, phase }),
            );
        }
    }

    // ── Actions ─────────────────────────────────────────────────────────────

    pub fn schedule(&mut self, action: Action) -> ActionHandle {
        info!(action = action.name(), tick = self.tick, "scheduling");
        self.scheduler.schedule(action, &mut self.mechanisms)
    }

    /// Schedule a fresh instance of the action registered as `name`.
    pub fn schedule_named(&mut self, name: &str) -> Result<ActionHandle, CompositionError> {
        let action = self.actions.get(name)?;
        Ok(self.schedule(action))
    }

    pub fn cancel(&mut self, handle: ActionHandle) -> bool {
        self.scheduler.cancel(handle, &mut self.mechanisms)
    }

    pub fn cancel_all(&mut self) {
        info!(tick = self.tick, "cancelling all actions");
        self.scheduler.cancel_all(&mut self.mechanisms);
    }

    /// Cancel everything, request 0 V everywhere and send it.
    ///
    /// Default actions restart at the next [`tick`][Self::tick].
    pub fn disable(&mut self) {
        self.scheduler.cancel_all(&mut self.mechanisms);
        self.mechanisms.stop_all();
        self.mechanisms.apply_all();
        self.publish();
        info!(tick = self.tick, "robot disabled");
    }

    pub fn is_running(&self, handle: ActionHandle) -> bool {
        self.scheduler.is_running(handle)
    }

    pub fn set_default(&mut self, mechanism: MechanismId, action: Action) -> Result<(), CompositionError> {
        self.scheduler
            .set_default(mechanism, action, &mut self.mechanisms)
    }

    pub fn bind(&mut self, trigger: Trigger) {
        debug!(trigger = trigger.name(), "trigger bound");
        self.triggers.bind(trigger);
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn registry(&self) -> &Arc<TunableRegistry> {
        &self.registry
    }

    pub fn mechanisms(&self) -> &Mechanisms {
        &self.mechanisms
    }

    pub fn mechanisms_mut(&mut self) -> &mut Mechanisms {
        &mut self.mechanisms
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionRegistry {
        &mut self.actions
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
