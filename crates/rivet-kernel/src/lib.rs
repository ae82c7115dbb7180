//! `rivet-kernel` – parameters and safety
//!
//! Holds the process-wide state every mechanism consults but none owns.
//!
//! # Modules
//!
//! - [`defaults`] – [`ParameterTable`][defaults::ParameterTable]: per-mode
//!   defaults for every tunable, resolved once into a
//!   [`ModeTable`][defaults::ModeTable] for the active execution mode.
//! - [`tunable`] – [`TunableRegistry`][tunable::TunableRegistry]: keyed
//!   runtime-adjustable scalars with tick-aligned commits.
//! - [`interlock`] – [`SafetyLimits`][interlock::SafetyLimits] and
//!   [`CurrentInterlock`][interlock::CurrentInterlock]: static current
//!   ceilings and per-channel overcurrent tracking.

pub mod defaults;
pub mod interlock;
pub mod tunable;

pub use defaults::{ModeDefaults, ModeTable, ParameterTable};
pub use interlock::{CurrentInterlock, InterlockVerdict, SafetyLimits};
pub use tunable::{TunableNumber, TunableRegistry};
