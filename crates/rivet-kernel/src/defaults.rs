//! Per-mode default tables for tunable parameters.
//!
//! Each parameter carries three defaults, one per
//! [`ExecutionMode`].  The table is resolved exactly once at startup into a
//! [`ModeTable`] for the active mode and handed to the
//! [`TunableRegistry`][crate::tunable::TunableRegistry]; nothing downstream
//! ever branches on the mode again.
//!
//! Keys are hierarchical: `"<Mechanism>/<group>/<coefficient>"`, e.g.
//! `"Shooter/Flywheel/kP"`.

use std::collections::{BTreeMap, HashMap};

use rivet_types::ExecutionMode;
use serde::{Deserialize, Serialize};

/// One parameter's defaults for every execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeDefaults {
    pub live: f64,
    pub simulated: f64,
    pub replay: f64,
}

impl ModeDefaults {
    /// The same default in every mode.
    pub const fn uniform(value: f64) -> Self {
        Self {
            live: value,
            simulated: value,
            replay: value,
        }
    }

    /// Live value for hardware and replay (replay reproduces the real
    /// robot), separate value for the simulator.
    pub const fn real_and_sim(real: f64, sim: f64) -> Self {
        Self {
            live: real,
            simulated: sim,
            replay: real,
        }
    }

    pub fn for_mode(&self, mode: ExecutionMode) -> f64 {
        match mode {
            ExecutionMode::Live => self.live,
            ExecutionMode::Simulated => self.simulated,
            ExecutionMode::Replay => self.replay,
        }
    }
}

/// Defaults for every known parameter, keyed by path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterTable(BTreeMap<String, ModeDefaults>);

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the defaults for `key`.
    pub fn insert(&mut self, key: impl Into<String>, defaults: ModeDefaults) {
        self.0.insert(key.into(), defaults);
    }

    pub fn get(&self, key: &str) -> Option<&ModeDefaults> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other` on top of this table; its entries win.
    pub fn merge(&mut self, other: ParameterTable) {
        self.0.extend(other.0);
    }

    /// Select every parameter's default for `mode`.
    pub fn resolve(&self, mode: ExecutionMode) -> ModeTable {
        ModeTable {
            mode,
            values: self
                .0
                .iter()
                .map(|(k, d)| (k.clone(), d.for_mode(mode)))
                .collect(),
        }
    }

    /// Gains and feedforward coefficients for every mechanism on the robot.
    pub fn builtin() -> Self {
        use ModeDefaults as D;
        let mut t = Self::new();

        // Shooter flywheels (left and right share one gain set).
        t.insert("Shooter/Flywheel/kP", D::real_and_sim(0.0006, 0.001));
        t.insert("Shooter/Flywheel/kI", D::uniform(0.0));
        t.insert("Shooter/Flywheel/kD", D::uniform(0.0));
        t.insert("Shooter/Flywheel/kS", D::real_and_sim(0.12, 0.0));
        t.insert("Shooter/Flywheel/kV", D::real_and_sim(0.00185, 0.002));
        t.insert("Shooter/Flywheel/kA", D::uniform(0.0));

        // Intake pivot
        t.insert("Intake/Pivot/kP", D::real_and_sim(3.0, 4.0));
        t.insert("Intake/Pivot/kI", D::uniform(0.0));
        t.insert("Intake/Pivot/kD", D::uniform(0.0));
        t.insert("Intake/Pivot/kS", D::uniform(0.0));
        t.insert("Intake/Pivot/kG", D::real_and_sim(0.35, 0.4));
        t.insert("Intake/Pivot/kV", D::uniform(0.0));
        t.insert("Intake/Pivot/kA", D::uniform(0.0));

        // Intake roller
        t.insert("Intake/Roller/kP", D::real_and_sim(0.0004, 0.001));
        t.insert("Intake/Roller/kI", D::uniform(0.0));
        t.insert("Intake/Roller/kD", D::uniform(0.0));
        t.insert("Intake/Roller/kS", D::real_and_sim(0.1, 0.0));
        t.insert("Intake/Roller/kV", D::real_and_sim(0.0021, 0.002));
        t.insert("Intake/Roller/kA", D::uniform(0.0));

        // Feeder roller
        t.insert("Feeder/Roller/kP", D::real_and_sim(0.0005, 0.001));
        t.insert("Feeder/Roller/kI", D::uniform(0.0));
        t.insert("Feeder/Roller/kD", D::uniform(0.0));
        t.insert("Feeder/Roller/kS", D::real_and_sim(0.09, 0.0));
        t.insert("Feeder/Roller/kV", D::real_and_sim(0.0020, 0.002));
        t.insert("Feeder/Roller/kA", D::uniform(0.0));

        // Shooter pivot arm
        t.insert("Pivot/Arm/kP", D::real_and_sim(4.0, 5.0));
        t.insert("Pivot/Arm/kI", D::uniform(0.0));
        t.insert("Pivot/Arm/kD", D::real_and_sim(0.05, 0.0));
        t.insert("Pivot/Arm/kS", D::uniform(0.0));
        t.insert("Pivot/Arm/kG", D::real_and_sim(0.5, 0.4));
        t.insert("Pivot/Arm/kV", D::uniform(0.0));
        t.insert("Pivot/Arm/kA", D::uniform(0.0));

        t
    }
}

/// Defaults for one execution mode, resolved from a [`ParameterTable`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModeTable {
    mode: ExecutionMode,
    values: HashMap<String, f64>,
}

impl ModeTable {
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}
