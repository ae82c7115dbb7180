//! Feedback half of every closed-loop channel.
//!
//! [`PidController`] turns `set_point - measurement` into volts.  The
//! mechanism owns one per channel, rewrites its gains from the tunable
//! registry every tick and adds model feedforward on top of the result, so
//! this type knows nothing about motors or registries.
//!
//! | Term | Per update |
//! |---|---|
//! | P | `kP · error` |
//! | I | `kI · ∑ error·dt`, clamped to the output range |
//! | D | `kD · Δerror / dt`, zero on the first update after a reset |
//!
//! ```rust
//! use rivet_hal::pid::PidController;
//! use rivet_types::PidGains;
//!
//! let mut flywheel = PidController::new(PidGains { kp: 0.001, ki: 0.0, kd: 0.0 });
//! flywheel.set_set_point(3000.0);
//! let volts = flywheel.update(0.0, 0.02);
//! assert!((volts - 3.0).abs() < 1e-9);
//! ```

use rivet_types::PidGains;

#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    set_point: f64,
    integral: f64,
    last_error: Option<f64>,
    output_min: f64,
    output_max: f64,
}

impl PidController {
    /// Unclamped until [`set_output_limits`][Self::set_output_limits].
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            set_point: 0.0,
            integral: 0.0,
            last_error: None,
            output_min: f64::NEG_INFINITY,
            output_max: f64::INFINITY,
        }
    }

    /// Swap in new gains without touching the accumulated state.
    ///
    /// The integral is stored as raw `∑ error·dt`, not as volts, so a new
    /// `kI` rescales the I term it contributes instead of discarding it.  An
    /// operator retuning a spinning flywheel therefore sees the output move
    /// by the change in gain, not drop back to the bare P term.  Pushing the
    /// same gains every tick is a no-op.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn set_set_point(&mut self, set_point: f64) {
        self.set_point = set_point;
    }

    pub fn set_point(&self) -> f64 {
        self.set_point
    }

    /// Clamp the output, and the I term on its own, to `[min, max]`.
    pub fn set_output_limits(&mut self, min: f64, max: f64) {
        self.output_min = min;
        self.output_max = max;
    }

    /// One control step, `dt` seconds after the previous one.
    ///
    /// A non-positive `dt` yields `0.0` and leaves the state alone.
    pub fn update(&mut self, measurement: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }
        let PidGains { kp, ki, kd } = self.gains;

        let error = self.set_point - measurement;
        let p = kp * error;

        // Back-compute the sum from the clamped term so it never winds past the rail.
        self.integral += error * dt;
        let i = (ki * self.integral).clamp(self.output_min, self.output_max);
        if ki.abs() > f64::EPSILON {
            self.integral = i / ki;
        }

        let d = match self.last_error {
            Some(prev) => kd * (error - prev) / dt,
            None => 0.0,
        };
        self.last_error = Some(error);

        (p + i + d).clamp(self.output_min, self.output_max)
    }

    /// Forget the integral and the previous error.  Called on mode changes,
    /// interlock trips and non-finite output.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
    }
}
