//! Ground-truth target propagation.
//!
//! Each target is a planar double integrator [px, py, vx, vy] driven by white
//! acceleration noise of intensity `q`. Velocities are clamped per axis to the
//! configured limit. Targets ignore obstacles and the agent.

use nalgebra::Vector4;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use tracker_core::kf::IntegratorKalmanFilter;
use tracker_core::{StateCov, StateVec};

/// Stochastic integrator model for all ground-truth targets.
#[derive(Clone, Debug)]
pub struct TargetModel {
    states: Vec<StateVec>,
    transition: StateCov,
    noise_factor: StateCov,
    vel_limit: f64,
    rng: ChaCha8Rng,
}

impl TargetModel {
    pub fn new(dt: f64, q: f64, vel_limit: f64, seed: u64) -> Self {
        Self {
            states: Vec::new(),
            transition: IntegratorKalmanFilter::transition_matrix(dt),
            noise_factor: IntegratorKalmanFilter::process_noise_factor(dt, q),
            vel_limit,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Replace all target states (velocities are clamped).
    pub fn reset(&mut self, states: Vec<StateVec>) {
        self.states = states;
        let limit = self.vel_limit;
        for s in &mut self.states {
            clamp_velocity(s, limit);
        }
    }

    /// Advance every target by exactly one step.
    pub fn advance(&mut self) {
        let limit = self.vel_limit;
        for s in &mut self.states {
            let n = Vector4::from_fn(|_, _| self.rng.sample::<f64, _>(StandardNormal));
            *s = self.transition * *s + self.noise_factor * n;
            clamp_velocity(s, limit);
        }
    }

    pub fn states(&self) -> &[StateVec] {
        &self.states
    }

    pub fn positions(&self) -> Vec<[f64; 2]> {
        self.states.iter().map(|s| [s[0], s[1]]).collect()
    }
}

fn clamp_velocity(state: &mut StateVec, limit: f64) {
    state[2] = state[2].clamp(-limit, limit);
    state[3] = state[3].clamp(-limit, limit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn noiseless_target_moves_at_constant_velocity() {
        let mut model = TargetModel::new(0.5, 0.0, 2.0, 7);
        model.reset(vec![StateVec::new(0.0, 0.0, 1.0, -0.5)]);
        for _ in 0..4 {
            model.advance();
        }
        let s = model.states()[0];
        assert_abs_diff_eq!(s[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s[1], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn velocity_is_clamped() {
        let mut model = TargetModel::new(0.5, 50.0, 2.0, 3);
        model.reset(vec![StateVec::new(0.0, 0.0, 5.0, -5.0)]);
        assert_eq!(model.states()[0][2], 2.0);
        assert_eq!(model.states()[0][3], -2.0);
        for _ in 0..50 {
            model.advance();
            let s = model.states()[0];
            assert!(s[2].abs() <= 2.0 && s[3].abs() <= 2.0);
        }
    }

    #[test]
    fn same_seed_same_trajectory() {
        let mut a = TargetModel::new(0.5, 0.1, 2.0, 11);
        let mut b = TargetModel::new(0.5, 0.1, 2.0, 11);
        a.reset(vec![StateVec::zeros(); 2]);
        b.reset(vec![StateVec::zeros(); 2]);
        for _ in 0..10 {
            a.advance();
            b.advance();
        }
        assert_eq!(a.states(), b.states());
        assert_ne!(a.states()[0], StateVec::zeros());
    }
}
