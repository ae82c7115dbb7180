//! `rivet-hal` – Hardware Abstraction Layer
//!
//! Everything between a mechanism controller and the physical (or simulated,
//! or replayed) world.
//!
//! # Modules
//!
//! - [`io`] – [`MechanismIo`][io::MechanismIo]: the capability set every
//!   backend implements (read inputs, command a channel, configure gains).
//! - [`live`] – [`LiveIo`][live::LiveIo]: forwards to device drivers, holds
//!   last-known values on bad reads and degrades to zero when hardware is
//!   unreachable.
//! - [`sim`] – [`SimIo`][sim::SimIo]: flywheel and arm plant models stepped
//!   once per command.
//! - [`replay`] – [`ReplayIo`][replay::ReplayIo]: recorded snapshots, all
//!   actuation discarded.
//! - [`tap`] – [`CommandTap`][tap::CommandTap]: records the command stream
//!   of any backend.
//! - [`driver`] – [`MotorDriver`][driver::MotorDriver] and
//!   [`BeamBreakDriver`][driver::BeamBreakDriver] device traits.
//! - [`pid`] – [`PidController`][pid::PidController].
//! - [`feedforward`] – simple-motor and arm feedforward models.

pub mod driver;
pub mod feedforward;
pub mod io;
pub mod live;
pub mod pid;
pub mod replay;
pub mod sim;
pub mod tap;

pub use driver::{BeamBreakDriver, DisconnectedDriver, MotorDriver, MotorReading};
pub use feedforward::{ArmFeedforward, SimpleMotorFeedforward};
pub use io::MechanismIo;
pub use live::LiveIo;
pub use pid::PidController;
pub use replay::ReplayIo;
pub use sim::{ArmModel, DcMotor, FlywheelModel, Plant, SimBeamBreak, SimIo};
pub use tap::{CommandTap, TapLog};
