//! `rivet-runtime` – mechanisms, actions and the control loop.
//!
//! # Modules
//!
//! - [`mechanism`] – [`Mechanism`][mechanism::Mechanism]: closed-loop
//!   control of one mechanism's channels (PID plus feedforward), current
//!   interlocks and fault reporting.
//! - [`subsystems`] – the robot's mechanisms ([`Intake`], [`Feeder`],
//!   [`Shooter`], [`Pivot`], [`Climber`], [`Drive`]) and backend wiring per
//!   [`ExecutionMode`][rivet_types::ExecutionMode].
//! - [`action`] – [`Action`][action::Action]: composable units of robot
//!   behaviour (sequence, race, join, deadline, wait, until).
//! - [`scheduler`] – [`Scheduler`][scheduler::Scheduler]: runs actions,
//!   enforces one owner per mechanism, and starts default actions.
//! - [`named`] – [`ActionRegistry`][named::ActionRegistry]: actions by name.
//! - [`trigger`] – [`Trigger`][trigger::Trigger]: edge-triggered bindings.
//! - [`routines`] – stock shooting and intaking routines.
//! - [`robot`] – [`Robot`][robot::Robot]: the fixed-rate tick.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console logs
//!   and optional OTLP span export.

pub mod action;
pub mod mechanism;
pub mod named;
pub mod robot;
pub mod routines;
pub mod scheduler;
pub mod subsystems;
pub mod telemetry;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use action::{Action, ActionState, CompositionError};
pub use mechanism::{ControlContext, Mechanism};
pub use named::ActionRegistry;
pub use robot::{Robot, RobotConfig};
pub use scheduler::{ActionHandle, Scheduler};
pub use subsystems::{Climber, Drive, Feeder, Intake, Mechanisms, Pivot, Shooter};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use trigger::Trigger;
