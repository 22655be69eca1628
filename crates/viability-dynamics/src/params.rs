//! Typed simulation parameter record.

use serde::{Deserialize, Serialize};

use crate::error::{DynamicsError, Result};

/// Physical parameters of a SLIP-family leg model.
///
/// An explicit, immutable record passed to every call — never ambient
/// state. Defaults match the reference experiment configuration (an 80 kg
/// runner with an 8200 N/m leg spring).
///
/// # Example
///
/// ```
/// use viability_dynamics::SlipParams;
///
/// let params = SlipParams::default()
///     .with_angle_of_attack(38.0_f64.to_radians())
///     .with_damping(5.0);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlipParams {
    /// Body mass [kg].
    pub mass: f64,

    /// Leg spring stiffness [N/m].
    pub stiffness: f64,

    /// Spring resting length [m].
    pub resting_length: f64,

    /// Gravitational acceleration [m/s^2].
    pub gravity: f64,

    /// Nominal angle of attack at touchdown [rad], measured from vertical.
    pub angle_of_attack: f64,

    /// Leg damping coefficient [N s/m]; 0 for the conservative SLIP,
    /// positive for the damped-actuated (daslip) variant.
    pub damping: f64,

    /// Series actuator resting length [m]; 0 for the plain SLIP.
    pub actuator_resting_length: f64,

    /// Cached total mechanical energy of the reference condition [J].
    /// Set from the initial state at experiment start.
    pub total_energy: f64,
}

impl Default for SlipParams {
    fn default() -> Self {
        Self {
            mass: 80.0,
            stiffness: 8200.0,
            resting_length: 1.0,
            gravity: 9.81,
            angle_of_attack: std::f64::consts::PI / 5.0,
            damping: 0.0,
            actuator_resting_length: 0.0,
            total_energy: 0.0,
        }
    }
}

impl SlipParams {
    /// Sets the angle of attack [rad].
    #[must_use]
    pub const fn with_angle_of_attack(mut self, angle: f64) -> Self {
        self.angle_of_attack = angle;
        self
    }

    /// Sets the leg damping coefficient.
    #[must_use]
    pub const fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Sets the body mass.
    #[must_use]
    pub const fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Sets the spring stiffness.
    #[must_use]
    pub const fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self
    }

    /// Sets the cached total energy.
    #[must_use]
    pub const fn with_total_energy(mut self, energy: f64) -> Self {
        self.total_energy = energy;
        self
    }

    /// Total leg length including the series actuator.
    #[must_use]
    pub fn total_leg_length(&self) -> f64 {
        self.resting_length + self.actuator_resting_length
    }

    /// Validates the record.
    ///
    /// # Errors
    ///
    /// Returns [`DynamicsError::InvalidParams`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(DynamicsError::invalid_params("mass must be positive"));
        }
        if !self.stiffness.is_finite() || self.stiffness <= 0.0 {
            return Err(DynamicsError::invalid_params("stiffness must be positive"));
        }
        if !self.resting_length.is_finite() || self.resting_length <= 0.0 {
            return Err(DynamicsError::invalid_params(
                "resting_length must be positive",
            ));
        }
        if !self.gravity.is_finite() || self.gravity <= 0.0 {
            return Err(DynamicsError::invalid_params("gravity must be positive"));
        }
        if !self.angle_of_attack.is_finite() {
            return Err(DynamicsError::invalid_params(
                "angle_of_attack must be finite",
            ));
        }
        if !self.damping.is_finite() || self.damping < 0.0 {
            return Err(DynamicsError::invalid_params(
                "damping must be non-negative",
            ));
        }
        if !self.actuator_resting_length.is_finite() || self.actuator_resting_length < 0.0 {
            return Err(DynamicsError::invalid_params(
                "actuator_resting_length must be non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn params_defaults() {
        let p = SlipParams::default();
        assert_relative_eq!(p.mass, 80.0);
        assert_relative_eq!(p.stiffness, 8200.0);
        assert_relative_eq!(p.resting_length, 1.0);
        assert_relative_eq!(p.gravity, 9.81);
        assert_relative_eq!(p.angle_of_attack, std::f64::consts::PI / 5.0);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn params_builder() {
        let p = SlipParams::default()
            .with_mass(0.3)
            .with_stiffness(900.0)
            .with_damping(2.0)
            .with_total_energy(120.0);
        assert_relative_eq!(p.mass, 0.3);
        assert_relative_eq!(p.stiffness, 900.0);
        assert_relative_eq!(p.damping, 2.0);
        assert_relative_eq!(p.total_energy, 120.0);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn params_validation_rejects_bad_fields() {
        assert!(SlipParams::default().with_mass(0.0).validate().is_err());
        assert!(SlipParams::default()
            .with_stiffness(-1.0)
            .validate()
            .is_err());
        assert!(SlipParams::default().with_damping(-0.1).validate().is_err());
        assert!(SlipParams::default()
            .with_angle_of_attack(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn params_total_leg_length() {
        let mut p = SlipParams::default();
        p.actuator_resting_length = 0.1;
        assert_relative_eq!(p.total_leg_length(), 1.1);
    }

    #[test]
    fn params_serialization_roundtrip() {
        let p = SlipParams::default().with_damping(3.0);
        let json = serde_json::to_string(&p).unwrap();
        let back: SlipParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
