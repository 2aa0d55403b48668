//! Heuristic chain solver.
//!
//! Sweeps per-joint corrective heuristics over a working copy of the chain
//! in a configurable order, optionally follows each adjustment with a twist
//! correction, and commits the working copy to the externally visible chain
//! only when its combined error strictly improves on the best seen so far.

pub mod heuristic;

use ik_types::{Chain, SegmentStats, Target};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::trik::heuristic::{AlignHeuristic, Heuristic, TwistHeuristic};
use crate::SolveState;

/// Joint visit order for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepOrder {
    /// Root to tip, damped adjustments.
    Forward,
    /// Tip to root, damped adjustments.
    Backward,
    /// Tip to root with full realignment per joint (cyclic coordinate
    /// descent).
    Ccd,
    /// Alternates forward and backward roles on each call.
    BackAndForth,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrikConfig {
    /// Sweep budget for [`TrikSolver::solve`].
    pub max_iterations: usize,
    /// Combined-error threshold for convergence.
    pub max_error: f64,
    /// Sweeps run per [`TrikSolver::step`] call.
    pub steps_per_tick: usize,
    /// Blend between position error (0.0) and orientation error (1.0).
    pub orientation_ratio: f64,
    /// Run the twist-correction heuristic after each positional adjustment.
    pub twist_correction: bool,
    /// Apply one joint adjustment per external call, for tracing.
    pub single_step: bool,
    /// Fraction of the full corrective rotation applied by damped sweeps.
    pub damping: f64,
}

impl Default for TrikConfig {
    fn default() -> Self {
        Self {
            max_iterations: 64,
            max_error: 1e-4,
            steps_per_tick: 1,
            orientation_ratio: 0.1,
            twist_correction: true,
            single_step: false,
            damping: 0.5,
        }
    }
}

const TARGET_SNAPSHOT_EPSILON: f64 = 1e-12;

/// Heuristic sweep solver with a keep-best commit rule.
#[derive(Debug, Clone)]
pub struct TrikSolver {
    /// Externally visible chain: always the best configuration seen.
    committed: Chain,
    /// Working copy the sweeps mutate.
    trial: Chain,
    sweep: SweepOrder,
    config: TrikConfig,
    target: Option<Target>,
    previous_target: Option<Target>,
    segment_stats: SegmentStats,
    best_error: f64,
    /// Which role a back-and-forth pass plays next.
    forward_pass: bool,
    /// Position in the current sweep when single-stepping.
    cursor: usize,
    iterations: usize,
}

impl TrikSolver {
    pub fn new(chain: Chain, sweep: SweepOrder) -> Self {
        let segment_stats = chain.segment_stats();
        Self {
            trial: chain.clone(),
            committed: chain,
            sweep,
            config: TrikConfig::default(),
            target: None,
            previous_target: None,
            segment_stats,
            best_error: f64::INFINITY,
            forward_pass: true,
            cursor: 0,
            iterations: 0,
        }
    }

    pub fn with_config(chain: Chain, sweep: SweepOrder, config: TrikConfig) -> Self {
        let mut solver = Self::new(chain, sweep);
        solver.config = config;
        solver
    }

    pub fn set_target(&mut self, target: Target) {
        self.target = Some(target);
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// The best chain configuration committed so far.
    pub fn chain(&self) -> &Chain {
        &self.committed
    }

    pub fn config(&self) -> &TrikConfig {
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

    /// Combined error of the committed chain (infinity before the first
    /// sweep, zero when no target is bound).
    pub fn error(&self) -> f64 {
        match &self.target {
            Some(_) => self.best_error,
            None => 0.0,
        }
    }

    /// End-effector distance of the committed chain to the target.
    pub fn position_error(&self) -> f64 {
        match &self.target {
            Some(target) if !self.committed.is_empty() => {
                (target.position - self.committed.end_effector_position()).norm()
            }
            _ => 0.0,
        }
    }

    fn changed(&self) -> bool {
        match (&self.target, &self.previous_target) {
            (Some(current), Some(snapshot)) => {
                !current.approx_eq(snapshot, TARGET_SNAPSHOT_EPSILON)
            }
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn reset(&mut self) {
        self.trial = self.committed.clone();
        self.segment_stats = self.committed.segment_stats();
        self.best_error = match &self.target {
            Some(target) if !self.committed.is_empty() => {
                self.combined_error(&self.committed, target)
            }
            _ => f64::INFINITY,
        };
        self.cursor = 0;
        self.iterations = 0;
        self.forward_pass = true;
        self.previous_target = self.target;
        debug!(
            best_error = self.best_error,
            avg_segment = self.segment_stats.average,
            "trik solver reset"
        );
    }

    /// Normalized squared position error blended with the arc-cosine
    /// orientation error.
    fn combined_error(&self, chain: &Chain, target: &Target) -> f64 {
        let scale = if self.segment_stats.average > 0.0 {
            self.segment_stats.average
        } else {
            1.0
        };
        let distance = (target.position - chain.end_effector_position()).norm();
        let position_term = (distance / scale).powi(2);

        let dot = chain
            .end_effector_orientation()
            .coords
            .dot(&target.orientation.coords);
        // acos of (1 - 2 * (1 - dot^2)) == angular distance between the
        // orientations.
        let orientation_term = (2.0 * dot * dot - 1.0).clamp(-1.0, 1.0).acos();

        let ratio = self.config.orientation_ratio.clamp(0.0, 1.0);
        (1.0 - ratio) * position_term + ratio * orientation_term
    }

    fn visit_order(&self) -> Vec<usize> {
        let free = self.committed.len().saturating_sub(1);
        match self.sweep {
            SweepOrder::Forward => (0..free).collect(),
            SweepOrder::Backward | SweepOrder::Ccd => (0..free).rev().collect(),
            SweepOrder::BackAndForth => {
                if self.forward_pass {
                    (0..free).collect()
                } else {
                    (0..free).rev().collect()
                }
            }
        }
    }

    fn apply_joint(&mut self, joint: usize, target: &Target) {
        let damping = match self.sweep {
            SweepOrder::Ccd => 1.0,
            _ => self.config.damping,
        };
        AlignHeuristic { damping }.apply(&mut self.trial, joint, target);
        if self.config.twist_correction {
            TwistHeuristic {
                damping: self.config.damping,
            }
            .apply(&mut self.trial, joint, target);
        }
    }

    /// Keep-best commit: publish the trial chain only on strict improvement.
    fn commit(&mut self, target: &Target) -> SolveState {
        let error = self.combined_error(&self.trial, target);
        if error < self.best_error {
            self.best_error = error;
            self.committed = self.trial.clone();
        }
        if self.best_error <= self.config.max_error {
            SolveState::Converged
        } else {
            SolveState::Iterating
        }
    }

    /// Run one sweep (or, in single-step mode, one joint adjustment).
    pub fn iterate(&mut self) -> SolveState {
        if self.changed() {
            self.reset();
        }
        let Some(target) = self.target else {
            return SolveState::NoTarget;
        };
        if self.committed.len() < 2 {
            return SolveState::Converged;
        }
        if self.best_error <= self.config.max_error {
            return SolveState::Converged;
        }

        let order = self.visit_order();
        if self.config.single_step {
            let joint = order[self.cursor];
            self.apply_joint(joint, &target);
            self.cursor += 1;
            if self.cursor >= order.len() {
                self.cursor = 0;
                if self.sweep == SweepOrder::BackAndForth {
                    self.forward_pass = !self.forward_pass;
                }
                self.iterations += 1;
                return self.commit(&target);
            }
            return SolveState::Iterating;
        }

        for joint in order {
            self.apply_joint(joint, &target);
        }
        if self.sweep == SweepOrder::BackAndForth {
            self.forward_pass = !self.forward_pass;
        }
        self.iterations += 1;
        self.commit(&target)
    }

    /// Run up to `steps_per_tick` sweeps; intended to be called once per
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

    /// Sweep until convergence or the budget is spent. Returns whether the
    /// combined error fell below `max_error`.
    #[instrument(skip(self), fields(sweep = ?self.sweep))]
    pub fn solve(&mut self) -> bool {
        if self.changed() {
            self.reset();
        }
        while self.iterations < self.config.max_iterations {
            match self.iterate() {
                SolveState::NoTarget | SolveState::Converged => return true,
                SolveState::Iterating => {}
            }
        }
        self.best_error <= self.config.max_error
    }
}
