//! Current interlocks.
//!
//! [`SafetyLimits`] is the static per-mechanism current ceiling table; it is
//! configuration, never a tunable.  [`CurrentInterlock`] tracks, for every
//! channel of one mechanism, whether the ceiling is being exceeded and
//! reports the edges so callers log an engage/release pair instead of one
//! line per tick.
//!
//! The comparison is on `|current|`: a roller jammed in reverse is as
//! dangerous as one jammed forward.  A NaN current trips the interlock.

use std::collections::BTreeMap;

use rivet_types::MechanismId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ────────────────────────────────────────────────────────────────────────────
// SafetyLimits
// ────────────────────────────────────────────────────────────────────────────

/// Current ceiling in amps, per mechanism.
///
/// Mechanisms without an entry are never interlocked.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SafetyLimits(BTreeMap<MechanismId, f64>);

impl SafetyLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// The robot's built-in ceilings.
    pub fn builtin() -> Self {
        let mut limits = Self::new();
        limits.set(MechanismId::Intake, 55.0);
        limits.set(MechanismId::Feeder, 80.0);
        limits.set(MechanismId::Shooter, 100.0);
        limits.set(MechanismId::Pivot, 60.0);
        limits.set(MechanismId::Climber, 80.0);
        limits
    }

    pub fn set(&mut self, mechanism: MechanismId, amps: f64) {
        self.0.insert(mechanism, amps);
    }

    pub fn limit(&self, mechanism: MechanismId) -> Option<f64> {
        self.0.get(&mechanism).copied()
    }

    /// Overlay `other`; its entries win.
    pub fn merge(&mut self, other: SafetyLimits) {
        self.0.extend(other.0);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CurrentInterlock
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of checking one channel's current for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockVerdict {
    /// Under the limit, and was last tick too.
    Clear,
    /// Crossed the limit this tick.
    Engaged,
    /// Still over the limit.
    Holding,
    /// Dropped back under the limit this tick.
    Released,
}

impl InterlockVerdict {
    /// `true` when the channel must be commanded to zero this tick.
    pub fn trips(self) -> bool {
        matches!(self, InterlockVerdict::Engaged | InterlockVerdict::Holding)
    }
}

/// Per-channel overcurrent tracker for one mechanism.
#[derive(Debug, Clone)]
pub struct CurrentInterlock {
    mechanism: MechanismId,
    limit_amps: Option<f64>,
    engaged: Vec<bool>,
}

impl CurrentInterlock {
    /// Interlock for `mechanism` with `channels` channels, limit taken from
    /// `limits`.
    pub fn new(mechanism: MechanismId, channels: usize, limits: &SafetyLimits) -> Self {
        Self {
            mechanism,
            limit_amps: limits.limit(mechanism),
            engaged: vec![false; channels],
        }
    }

    pub fn limit_amps(&self) -> Option<f64> {
        self.limit_amps
    }

    /// Whether `channel` is currently interlocked.
    pub fn is_engaged(&self, channel: usize) -> bool {
        self.engaged.get(channel).copied().unwrap_or(false)
    }

    /// Check `current_amps` on `channel` and update its state.
    pub fn check(&mut self, channel: usize, current_amps: f64) -> InterlockVerdict {
        let Some(limit) = self.limit_amps else {
            return InterlockVerdict::Clear;
        };
        let Some(engaged) = self.engaged.get_mut(channel) else {
            return InterlockVerdict::Clear;
        };
        let over = current_amps.is_nan() || current_amps.abs() > limit;
        let verdict = match (*engaged, over) {
            (false, false) => InterlockVerdict::Clear,
            (false, true) => InterlockVerdict::Engaged,
            (true, true) => InterlockVerdict::Holding,
            (true, false) => InterlockVerdict::Released,
        };
        *engaged = over;

        match verdict {
            InterlockVerdict::Engaged => warn!(
                mechanism = %self.mechanism,
                channel,
                current_amps,
                limit_amps = limit,
                "current interlock engaged"
            ),
            InterlockVerdict::Released => info!(
                mechanism = %self.mechanism,
                channel,
                current_amps,
                "current interlock released"
            ),
            _ => {}
        }
        verdict
    }
}
