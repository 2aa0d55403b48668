//! Jacobian solver orchestrator.
//!
//! Owns the chain and target and runs the clamp-error, build-Jacobian,
//! solve-delta, clamp-step, apply, converge-check loop. The three concrete
//! variants differ only in the [`LinearStrategy`] chosen at construction.

use ik_types::{Chain, Target};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::jacobian::{self, strategy::LinearStrategy};
use crate::SolveState;

/// Orchestrator configuration shared by all three Jacobian variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Iteration budget for [`JacobianIkSolver::solve`].
    pub max_iterations: usize,
    /// End-effector distance below which the solver reports convergence.
    pub max_error: f64,
    /// Iterations run per [`JacobianIkSolver::step`] call.
    pub steps_per_tick: usize,
    /// Per-component cap applied to every delta, regardless of strategy.
    pub max_step: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            max_error: 0.01,
            steps_per_tick: 1,
            max_step: 45.0_f64.to_radians(),
        }
    }
}

/// Iterative Jacobian-based IK solver for a single end-effector.
#[derive(Debug, Clone)]
pub struct JacobianIkSolver {
    chain: Chain,
    strategy: LinearStrategy,
    config: SolverConfig,
    target: Option<Target>,
    /// Snapshot of the target the last reset saw; a mismatch forces a reset.
    previous_target: Option<Target>,
    max_reach: f64,
    iterations: usize,
}

/// Tolerance for deciding a bound target has been swapped out from under us.
const TARGET_SNAPSHOT_EPSILON: f64 = 1e-12;

impl JacobianIkSolver {
    pub fn new(chain: Chain, strategy: LinearStrategy) -> Self {
        let max_reach = chain.max_reach();
        Self {
            chain,
            strategy,
            config: SolverConfig::default(),
            target: None,
            previous_target: None,
            max_reach,
            iterations: 0,
        }
    }

    pub fn with_config(chain: Chain, strategy: LinearStrategy, config: SolverConfig) -> Self {
        let mut solver = Self::new(chain, strategy);
        solver.config = config;
        solver
    }

    pub fn set_target(&mut self, target: Target) {
        self.target = Some(target);
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn into_chain(self) -> Chain {
        self.chain
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.config.max_iterations = max_iterations;
    }

    pub fn set_max_error(&mut self, max_error: f64) {
        self.config.max_error = max_error;
    }

    pub fn set_steps_per_tick(&mut self, steps: usize) {
        self.config.steps_per_tick = steps.max(1);
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Current end-effector distance to the target (zero when no target is
    /// bound or the chain has no joints).
    pub fn error(&self) -> f64 {
        match &self.target {
            Some(target) if !self.chain.is_empty() => {
                (target.position - self.chain.end_effector_position()).norm()
            }
            _ => 0.0,
        }
    }

    /// Whether the bound target differs from the snapshot taken at the last
    /// reset.
    fn changed(&self) -> bool {
        match (&self.target, &self.previous_target) {
            (Some(current), Some(snapshot)) => {
                !current.approx_eq(snapshot, TARGET_SNAPSHOT_EPSILON)
            }
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Recompute reach, clear the iteration counter and re-snapshot the
    /// target.
    fn reset(&mut self) {
        self.max_reach = self.chain.max_reach();
        self.iterations = 0;
        self.previous_target = self.target;
        debug!(max_reach = self.max_reach, "jacobian solver reset");
    }

    /// Run one clamp/build/solve/apply cycle.
    pub fn iterate(&mut self) -> SolveState {
        if self.changed() {
            self.reset();
        }
        let Some(target) = self.target else {
            return SolveState::NoTarget;
        };
        if self.chain.len() < 2 {
            return SolveState::Converged;
        }

        let mut error_vector = target.position - self.chain.end_effector_position();
        let distance = error_vector.norm();
        if distance < self.config.max_error {
            return SolveState::Converged;
        }
        // Unreachable targets are pulled back to the maximum-reach sphere so
        // the step stays bounded.
        if distance > self.max_reach && self.max_reach > 0.0 {
            error_vector *= self.max_reach / distance;
        }

        let arm = jacobian::build(&self.chain, &target.position);
        let error = DVector::from_row_slice(error_vector.as_slice());
        let mut delta = self.strategy.solve_delta(&arm.matrix, &error);

        let peak = delta.amax();
        if peak > self.config.max_step && peak > 0.0 {
            delta *= self.config.max_step / peak;
        }

        for (j, axis) in arm.axes.iter().enumerate() {
            let angle = delta[j];
            if angle != 0.0 {
                self.chain.rotate_about_world_axis(j, axis, angle);
            }
        }
        self.iterations += 1;

        if self.error() < self.config.max_error {
            SolveState::Converged
        } else {
            SolveState::Iterating
        }
    }

    /// Run up to `steps_per_tick` iterations; intended to be called once per
    /// external tick.
    pub fn step(&mut self) -> SolveState {
        let mut state = SolveState::Iterating;
        for _ in 0..self.config.steps_per_tick {
            state = self.iterate();
            if state.is_done() {
                break;
            }
        }
        state
    }

    /// Iterate until convergence or the iteration budget is spent. Returns
    /// whether the end-effector got within `max_error` of the target.
    #[instrument(skip(self), fields(strategy = ?self.strategy))]
    pub fn solve(&mut self) -> bool {
        if self.changed() {
            self.reset();
        }
        while self.iterations < self.config.max_iterations {
            match self.iterate() {
                SolveState::NoTarget | SolveState::Converged => {
                    debug!(iterations = self.iterations, error = self.error(), "converged");
                    return true;
                }
                SolveState::Iterating => {}
            }
        }
        debug!(error = self.error(), "iteration budget exhausted");
        self.error() < self.config.max_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ik_types::Mode;
    use nalgebra::Vector3;

    fn planar_arm() -> Chain {
        Chain::serial(
            Mode::Planar,
            &[
                Vector3::zeros(),
                Vector3::new(50.0, 0.0, 0.0),
                Vector3::new(50.0, 0.0, 0.0),
            ],
        )
    }

    #[test]
    fn test_no_target_is_a_no_op() {
        let mut solver = JacobianIkSolver::new(planar_arm(), LinearStrategy::pseudo_inverse());
        let before = solver.chain().clone();
        assert_eq!(solver.iterate(), SolveState::NoTarget);
        assert_eq!(solver.chain(), &before);
        assert_eq!(solver.error(), 0.0);
    }

    #[test]
    fn test_short_chain_converges_immediately() {
        let chain = Chain::serial(Mode::Spatial, &[Vector3::zeros()]);
        let mut solver = JacobianIkSolver::new(chain, LinearStrategy::sdls());
        solver.set_target(Target::new(Vector3::new(1.0, 0.0, 0.0)));
        let before = solver.chain().clone();
        assert_eq!(solver.iterate(), SolveState::Converged);
        assert_eq!(solver.chain(), &before);
    }

    #[test]
    fn test_empty_chain_reports_zero_error() {
        let mut solver =
            JacobianIkSolver::new(Chain::new(Mode::Spatial), LinearStrategy::pseudo_inverse());
        solver.set_target(Target::new(Vector3::new(1.0, 0.0, 0.0)));
        assert_eq!(solver.error(), 0.0);
        assert_eq!(solver.iterate(), SolveState::Converged);
        assert!(solver.solve());
    }

    #[test]
    fn test_target_change_resets_iteration_counter() {
        let mut solver = JacobianIkSolver::new(planar_arm(), LinearStrategy::pseudo_inverse());
        solver.set_target(Target::new(Vector3::new(60.0, 40.0, 0.0)));
        solver.iterate();
        solver.iterate();
        assert!(solver.iterations() > 0);
        solver.set_target(Target::new(Vector3::new(40.0, 60.0, 0.0)));
        solver.iterate();
        assert_eq!(solver.iterations(), 1);
    }

    #[test]
    fn test_step_honors_steps_per_tick() {
        let mut solver = JacobianIkSolver::new(planar_arm(), LinearStrategy::pseudo_inverse());
        solver.set_target(Target::new(Vector3::new(60.0, 40.0, 0.0)));
        solver.set_steps_per_tick(3);
        solver.step();
        assert_eq!(solver.iterations(), 3);
    }

    #[test]
    fn test_iteration_error_is_monotonically_bounded() {
        // Every step is clamped, so a single iteration can never throw the
        // end-effector past twice the step cap times the reach.
        let mut solver = JacobianIkSolver::new(planar_arm(), LinearStrategy::pseudo_inverse());
        solver.set_target(Target::new(Vector3::new(63.64, 63.64, 0.0)));
        let before = solver.error();
        solver.iterate();
        let after = solver.error();
        assert!(after.is_finite());
        assert!(after < before + 2.0 * solver.config().max_step * 100.0);
    }
}
