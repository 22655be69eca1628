//! Analytic apex-return toy model.
//!
//! `ApexHopper` is a closed-form stand-in for the integrated SLIP step:
//! it maps normalized apex height under a touchdown angle to the next
//! apex height, with the same failure modes a real stance integration
//! reports (leg behind the body, leg penetration, falling). It exists so
//! demos and integration tests have a deterministic collaborator; real
//! integrators plug in behind the same traits.

use crate::error::{DynamicsError, Result};
use crate::model::{LegModel, PoincareMap};
use crate::params::SlipParams;
use crate::transition::{Trajectory, Transition};

/// Apex height below which the hop counts as a fall (normalized).
const FALL_HEIGHT: f64 = 0.05;

/// Fraction of the height error recovered per step by the leg spring.
const RECOVERY_GAIN: f64 = 0.5;

/// Per-step height loss per unit damping (normalized).
const DAMPING_LOSS: f64 = 0.002;

/// Energy-maximal apex height [m] of the canonical initial condition
/// (0.85 m apex at 5.5 m/s forward speed): 0.85 + 5.5^2 / (2 * 9.81).
const DEFAULT_MAX_APEX: f64 = 2.391_502_548_419_979;

/// Analytic apex-to-apex return map for a SLIP-like hopper.
///
/// Poincaré-section state: apex height normalized by the energy-maximal
/// height `E / (m g)`, one dimension. Low values mean a fast, flat hop;
/// values near 1 mean nearly all energy is vertical. Action: touchdown
/// angle of attack `alpha` [rad] from vertical, one dimension.
///
/// Transition rules:
/// - `alpha < 0` — leg points backward at touchdown: failure.
/// - apex below the leg's touchdown height `L cos(alpha)` — the leg
///   penetrates the ground before apex: failure.
/// - otherwise the next apex relaxes toward an angle-dependent
///   equilibrium height, minus a damping loss; leaving
///   `(0.05, 1.0)` is a fall.
///
/// # Example
///
/// ```
/// use viability_dynamics::{ApexHopper, PoincareMap, SlipParams};
///
/// let model = ApexHopper::new(SlipParams::default()).unwrap();
/// let t = model.poincare_map(&[0.45], &[38.0_f64.to_radians()]).unwrap();
/// assert!(!t.is_failure());
/// ```
#[derive(Debug, Clone)]
pub struct ApexHopper {
    params: SlipParams,
    /// Energy-maximal apex height [m]; the normalization scale.
    max_apex: f64,
}

impl ApexHopper {
    /// Creates the model after validating the parameter record.
    ///
    /// When `params.total_energy` is positive, the normalization scale is
    /// `total_energy / (mass * gravity)`; otherwise the canonical initial
    /// condition's scale is used.
    ///
    /// # Errors
    ///
    /// Returns [`DynamicsError::InvalidParams`] if validation fails.
    pub fn new(params: SlipParams) -> Result<Self> {
        params.validate()?;
        let max_apex = if params.total_energy > 0.0 {
            params.total_energy / (params.mass * params.gravity)
        } else {
            DEFAULT_MAX_APEX
        };
        Ok(Self { params, max_apex })
    }

    /// The parameter record this model was built with.
    #[must_use]
    pub const fn params(&self) -> &SlipParams {
        &self.params
    }

    /// The apex-height normalization scale [m].
    #[must_use]
    pub const fn max_apex_height(&self) -> f64 {
        self.max_apex
    }

    /// Equilibrium normalized apex height for a touchdown angle.
    ///
    /// Intermediate angles balance vertical rebound against forward
    /// progression; both a vertical and a horizontal leg settle low.
    fn equilibrium_height(alpha: f64) -> f64 {
        0.28f64.mul_add((2.0 * alpha).sin(), 0.18)
    }

    fn check_dims(&self, state: &[f64], action: &[f64]) -> Result<()> {
        if state.len() != 1 {
            return Err(DynamicsError::DimensionMismatch {
                expected: 1,
                actual: state.len(),
            });
        }
        if action.len() != 1 {
            return Err(DynamicsError::DimensionMismatch {
                expected: 1,
                actual: action.len(),
            });
        }
        Ok(())
    }
}

impl PoincareMap for ApexHopper {
    fn state_dims(&self) -> usize {
        1
    }

    fn action_dims(&self) -> usize {
        1
    }

    fn poincare_map(&self, state: &[f64], action: &[f64]) -> Result<Transition> {
        self.check_dims(state, action)?;
        let h = state[0];
        let alpha = action[0];

        if !h.is_finite() || !alpha.is_finite() {
            return Err(DynamicsError::infeasible("non-finite section state"));
        }
        // Leg behind the body at touchdown trips the hopper.
        if alpha < 0.0 {
            return Ok(Transition::Failure);
        }
        // Apex below the leg's touchdown height: no flight phase exists.
        let touchdown_height = self.params.total_leg_length() * alpha.cos();
        if h * self.max_apex <= touchdown_height {
            return Ok(Transition::Failure);
        }

        let target = Self::equilibrium_height(alpha);
        let next =
            RECOVERY_GAIN.mul_add(target - h, h) - DAMPING_LOSS * self.params.damping * h;

        if !(FALL_HEIGHT..1.0).contains(&next) {
            return Ok(Transition::Failure);
        }
        Ok(Transition::success(vec![next]))
    }
}

impl LegModel for ApexHopper {
    fn reset_leg(&self, state: &[f64]) -> Result<Vec<f64>> {
        if state.len() != 6 {
            return Err(DynamicsError::DimensionMismatch {
                expected: 6,
                actual: state.len(),
            });
        }
        let length = self.params.total_leg_length();
        let alpha = self.params.angle_of_attack;
        let mut out = state.to_vec();
        out[4] = state[0] + length * alpha.sin();
        out[5] = state[1] - length * alpha.cos();
        Ok(out)
    }

    fn step(&self, state: &[f64]) -> Result<Trajectory> {
        let state = self.reset_leg(state)?;
        let (x0, y0, vx) = (state[0], state[1], state[2]);
        let g = self.params.gravity;
        let y_td = self.params.total_leg_length() * self.params.angle_of_attack.cos();
        if y0 <= y_td {
            return Err(DynamicsError::infeasible(
                "apex below touchdown height, no flight phase",
            ));
        }

        // Ballistic descent from apex to touchdown, sampled uniformly.
        let t_td = (2.0 * (y0 - y_td) / g).sqrt();
        let samples = 20;
        let mut time = Vec::with_capacity(samples + 1);
        let mut states = Vec::with_capacity(samples + 1);
        #[allow(clippy::cast_precision_loss)]
        for i in 0..=samples {
            let t = t_td * i as f64 / samples as f64;
            let mut s = state.clone();
            s[0] = vx.mul_add(t, x0);
            s[1] = (-0.5 * g * t).mul_add(t, y0);
            s[3] = -g * t;
            time.push(t);
            states.push(s);
        }

        Ok(Trajectory {
            time,
            states,
            events: vec![t_td],
        })
    }

    fn compute_total_energy(&self, state: &[f64]) -> Result<f64> {
        if state.len() < 4 {
            return Err(DynamicsError::DimensionMismatch {
                expected: 6,
                actual: state.len(),
            });
        }
        let (y, vx, vy) = (state[1], state[2], state[3]);
        let m = self.params.mass;
        Ok(m * self.params.gravity * y + 0.5 * m * vx.mul_add(vx, vy * vy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> ApexHopper {
        ApexHopper::new(SlipParams::default()).unwrap()
    }

    #[test]
    fn new_rejects_invalid_params() {
        assert!(ApexHopper::new(SlipParams::default().with_mass(-1.0)).is_err());
    }

    #[test]
    fn normalization_scale_from_total_energy() {
        let canonical = model();
        assert_relative_eq!(canonical.max_apex_height(), DEFAULT_MAX_APEX);

        let explicit =
            ApexHopper::new(SlipParams::default().with_total_energy(80.0 * 9.81 * 2.0)).unwrap();
        assert_relative_eq!(explicit.max_apex_height(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn negative_angle_fails() {
        let t = model().poincare_map(&[0.8], &[-0.1]).unwrap();
        assert!(t.is_failure());
    }

    #[test]
    fn shallow_angle_at_low_apex_fails() {
        // cos(10 deg) / max_apex ~ 0.41 > 0.3: the leg penetrates.
        let t = model()
            .poincare_map(&[0.3], &[10.0_f64.to_radians()])
            .unwrap();
        assert!(t.is_failure());
    }

    #[test]
    fn seed_condition_is_viable() {
        let t = model()
            .poincare_map(&[0.45], &[38.0_f64.to_radians()])
            .unwrap();
        assert!(!t.is_failure());
    }

    #[test]
    fn steep_angle_converges_to_equilibrium() {
        let m = model();
        let alpha = 60.0_f64.to_radians();
        let mut h = 0.45;
        for _ in 0..50 {
            let t = m.poincare_map(&[h], &[alpha]).unwrap();
            let next = t.next_state().expect("viable hop")[0];
            assert!((FALL_HEIGHT..1.0).contains(&next));
            h = next;
        }
        assert_relative_eq!(h, ApexHopper::equilibrium_height(alpha), epsilon = 1e-6);
    }

    #[test]
    fn damping_lowers_next_apex() {
        let undamped = model();
        let damped = ApexHopper::new(SlipParams::default().with_damping(20.0)).unwrap();
        let alpha = 70.0_f64.to_radians();
        let a = undamped.poincare_map(&[0.5], &[alpha]).unwrap();
        let b = damped.poincare_map(&[0.5], &[alpha]).unwrap();
        assert!(b.next_state().unwrap()[0] < a.next_state().unwrap()[0]);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        assert!(model().poincare_map(&[0.5, 0.2], &[0.5]).is_err());
        assert!(model().poincare_map(&[0.5], &[]).is_err());
    }

    #[test]
    fn reset_leg_places_foot() {
        let m = model();
        let state = vec![0.0, 0.85, 5.5, 0.0, 0.0, 0.0];
        let reset = m.reset_leg(&state).unwrap();
        let alpha = m.params().angle_of_attack;
        assert_relative_eq!(reset[4], alpha.sin(), epsilon = 1e-12);
        assert_relative_eq!(reset[5], 0.85 - alpha.cos(), epsilon = 1e-12);
    }

    #[test]
    fn step_descends_to_touchdown() {
        let m = model();
        let traj = m.step(&[0.0, 0.85, 5.5, 0.0, 0.0, 0.0]).unwrap();
        assert!(!traj.is_empty());
        assert_eq!(traj.events.len(), 1);
        let y_td = m.params().angle_of_attack.cos();
        let last = traj.final_state().unwrap();
        assert_relative_eq!(last[1], y_td, epsilon = 1e-9);
        // Monotone descent.
        for pair in traj.states.windows(2) {
            assert!(pair[1][1] <= pair[0][1] + 1e-12);
        }
    }

    #[test]
    fn step_infeasible_below_touchdown() {
        let m = model();
        let err = m.step(&[0.0, 0.2, 5.5, 0.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, DynamicsError::Infeasible(_)));
    }

    #[test]
    fn total_energy_matches_hand_computation() {
        let m = model();
        let e = m
            .compute_total_energy(&[0.0, 0.85, 5.5, 0.0, 0.0, 0.0])
            .unwrap();
        // m g y + 1/2 m v^2 = 80 * 9.81 * 0.85 + 0.5 * 80 * 5.5^2
        assert_relative_eq!(e, 80.0 * 9.81 * 0.85 + 0.5 * 80.0 * 30.25, epsilon = 1e-9);
    }
}
