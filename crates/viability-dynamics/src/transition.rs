//! Transition and trajectory data types.

use serde::{Deserialize, Serialize};

/// Outcome of applying one action at one state on the Poincaré section.
///
/// A `Failure` means the trajectory violated a safety condition (falling,
/// leg penetration, integration breakdown); there is no meaningful
/// successor state in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    /// The step completed and returned to the section.
    Success {
        /// Successor state on the Poincaré section, in grid coordinates.
        next_state: Vec<f64>,
    },
    /// The trajectory violated a safety condition.
    Failure,
}

impl Transition {
    /// Creates a successful transition.
    #[must_use]
    pub fn success(next_state: Vec<f64>) -> Self {
        Self::Success { next_state }
    }

    /// Returns `true` for failed transitions.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }

    /// The successor state, if the transition succeeded.
    #[must_use]
    pub fn next_state(&self) -> Option<&[f64]> {
        match self {
            Self::Success { next_state } => Some(next_state),
            Self::Failure => None,
        }
    }
}

/// A simulated step trajectory as produced by [`crate::LegModel::step`].
///
/// `states[i]` is the full model state at `time[i]`; `events` holds event
/// times (touchdown, liftoff, apex) in chronological order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trajectory {
    /// Sample times [s].
    pub time: Vec<f64>,
    /// Full model state at each sample time.
    pub states: Vec<Vec<f64>>,
    /// Event times [s].
    pub events: Vec<f64>,
}

impl Trajectory {
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Returns `true` if the trajectory holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// The final state, if any samples exist.
    #[must_use]
    pub fn final_state(&self) -> Option<&[f64]> {
        self.states.last().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_success_accessors() {
        let t = Transition::success(vec![0.4]);
        assert!(!t.is_failure());
        assert_eq!(t.next_state(), Some(&[0.4][..]));
    }

    #[test]
    fn transition_failure_accessors() {
        let t = Transition::Failure;
        assert!(t.is_failure());
        assert_eq!(t.next_state(), None);
    }

    #[test]
    fn trajectory_final_state() {
        let traj = Trajectory {
            time: vec![0.0, 0.1],
            states: vec![vec![0.0, 1.0], vec![0.1, 0.9]],
            events: vec![0.1],
        };
        assert_eq!(traj.len(), 2);
        assert!(!traj.is_empty());
        assert_eq!(traj.final_state(), Some(&[0.1, 0.9][..]));
    }

    #[test]
    fn trajectory_empty() {
        let traj = Trajectory::default();
        assert!(traj.is_empty());
        assert_eq!(traj.final_state(), None);
    }

    #[test]
    fn transition_serialization_roundtrip() {
        let t = Transition::success(vec![0.5, 0.25]);
        let json = serde_json::to_string(&t).unwrap();
        let back: Transition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
