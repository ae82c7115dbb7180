//! Model-based feedforward.
//!
//! Two models cover every channel on the robot:
//!
//! | Model | Formula | Used by |
//! |---|---|---|
//! | [`SimpleMotorFeedforward`] | `kS·sign(v) + kV·v + kA·a` | rollers, flywheels |
//! | [`ArmFeedforward`] | `kS·sign(v) + kG·cos(θ) + kV·v + kA·a` | pivoting arms |
//!
//! `sign(0)` is exactly zero, so a channel commanded to rest never gets a
//! static-friction kick.  The arm model takes the *target* angle; evaluating
//! gravity at the measured angle makes the output chatter around the
//! set-point.

use rivet_types::FeedforwardGains;

/// Sign function that maps zero (and NaN) to zero.
#[inline]
pub fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Feedforward for a mechanism with no gravity load.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimpleMotorFeedforward {
    pub ks: f64,
    pub kv: f64,
    pub ka: f64,
}

impl SimpleMotorFeedforward {
    pub fn from_gains(gains: &FeedforwardGains) -> Self {
        Self {
            ks: gains.ks,
            kv: gains.kv,
            ka: gains.ka,
        }
    }

    /// Volts needed to hold `velocity` while accelerating at `acceleration`.
    pub fn calculate(&self, velocity: f64, acceleration: f64) -> f64 {
        self.ks * sign(velocity) + self.kv * velocity + self.ka * acceleration
    }
}

/// Feedforward for a rotating arm whose gravity load varies with `cos(θ)`.
///
/// The angle is measured from horizontal, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArmFeedforward {
    pub ks: f64,
    pub kg: f64,
    pub kv: f64,
    pub ka: f64,
}

impl ArmFeedforward {
    pub fn from_gains(gains: &FeedforwardGains) -> Self {
        Self {
            ks: gains.ks,
            kg: gains.kg,
            kv: gains.kv,
            ka: gains.ka,
        }
    }

    pub fn calculate(&self, angle_rad: f64, velocity: f64, acceleration: f64) -> f64 {
        self.ks * sign(velocity)
            + self.kg * angle_rad.cos()
            + self.kv * velocity
            + self.ka * acceleration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn sign_of_zero_is_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(f64::NAN), 0.0);
        assert_eq!(sign(12.5), 1.0);
        assert_eq!(sign(-0.001), -1.0);
    }

    #[test]
    fn static_term_vanishes_at_rest() {
        let ff = SimpleMotorFeedforward {
            ks: 0.25,
            kv: 0.002,
            ka: 0.0,
        };
        let out = ff.calculate(0.0, 0.0);
        assert_eq!(out, 0.0);
        assert!(!out.is_nan());
    }

    #[test]
    fn simple_motor_combines_terms() {
        let ff = SimpleMotorFeedforward {
            ks: 0.1,
            kv: 0.002,
            ka: 0.01,
        };
        let out = ff.calculate(-1000.0, 50.0);
        assert!((out - (-0.1 - 2.0 + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn arm_gravity_is_maximal_at_horizontal() {
        let ff = ArmFeedforward {
            ks: 0.0,
            kg: 0.6,
            kv: 0.0,
            ka: 0.0,
        };
        assert!((ff.calculate(0.0, 0.0, 0.0) - 0.6).abs() < 1e-12);
        assert!(ff.calculate(FRAC_PI_2, 0.0, 0.0).abs() < 1e-12);
    }

    #[test]
    fn arm_static_term_vanishes_at_rest() {
        let ff = ArmFeedforward {
            ks: 0.3,
            kg: 0.0,
            kv: 0.0,
            ka: 0.0,
        };
        assert_eq!(ff.calculate(1.0, 0.0, 0.0), 0.0);
        assert!((ff.calculate(1.0, 2.0, 0.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn from_gains_drops_gravity_for_simple_model() {
        let gains = FeedforwardGains {
            ks: 0.1,
            kg: 9.0,
            kv: 0.0,
            ka: 0.0,
        };
        let ff = SimpleMotorFeedforward::from_gains(&gains);
        assert!((ff.calculate(1.0, 0.0) - 0.1).abs() < 1e-12);
    }
}
