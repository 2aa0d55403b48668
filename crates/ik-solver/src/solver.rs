//! Unified solver front-end.
//!
//! [`Solver`] wraps any of the three solver families behind one object-safe
//! trait so callers can pick a strategy at runtime without branching on the
//! concrete type.

use ik_types::{Chain, Target};
use serde::{Deserialize, Serialize};

use crate::error::IkError;
use crate::evolution::{EvolutionConfig, EvolutionSolver};
use crate::jacobian::solver::JacobianIkSolver;
use crate::jacobian::strategy::LinearStrategy;
use crate::trik::{SweepOrder, TrikSolver};
use crate::SolveState;

/// Common surface of every solver family.
pub trait SolveStrategy {
    fn set_target(&mut self, target: Target);
    /// Advance one iteration (one sweep, one generation, or one Jacobian
    /// step, depending on the family).
    fn iterate(&mut self) -> SolveState;
    /// Run until convergence or the family's budget is spent.
    fn solve(&mut self) -> bool;
    fn error(&self) -> f64;
    fn set_max_iterations(&mut self, max_iterations: usize);
    fn set_max_error(&mut self, max_error: f64);
    /// Iterations per external tick; families without ticking ignore it.
    fn set_steps_per_tick(&mut self, _steps: usize) {}
    fn chain(&self) -> &Chain;
}

impl SolveStrategy for JacobianIkSolver {
    fn set_target(&mut self, target: Target) {
        JacobianIkSolver::set_target(self, target);
    }

    fn iterate(&mut self) -> SolveState {
        JacobianIkSolver::iterate(self)
    }

    fn solve(&mut self) -> bool {
        JacobianIkSolver::solve(self)
    }

    fn error(&self) -> f64 {
        JacobianIkSolver::error(self)
    }

    fn set_max_iterations(&mut self, max_iterations: usize) {
        JacobianIkSolver::set_max_iterations(self, max_iterations);
    }

    fn set_max_error(&mut self, max_error: f64) {
        JacobianIkSolver::set_max_error(self, max_error);
    }

    fn set_steps_per_tick(&mut self, steps: usize) {
        JacobianIkSolver::set_steps_per_tick(self, steps);
    }

    fn chain(&self) -> &Chain {
        JacobianIkSolver::chain(self)
    }
}

impl SolveStrategy for TrikSolver {
    fn set_target(&mut self, target: Target) {
        TrikSolver::set_target(self, target);
    }

    fn iterate(&mut self) -> SolveState {
        TrikSolver::iterate(self)
    }

    fn solve(&mut self) -> bool {
        TrikSolver::solve(self)
    }

    fn error(&self) -> f64 {
        TrikSolver::error(self)
    }

    fn set_max_iterations(&mut self, max_iterations: usize) {
        TrikSolver::set_max_iterations(self, max_iterations);
    }

    fn set_max_error(&mut self, max_error: f64) {
        TrikSolver::set_max_error(self, max_error);
    }

    fn set_steps_per_tick(&mut self, steps: usize) {
        TrikSolver::set_steps_per_tick(self, steps);
    }

    fn chain(&self) -> &Chain {
        TrikSolver::chain(self)
    }
}

impl SolveStrategy for EvolutionSolver {
    /// Binds the target to the end-effector slot.
    fn set_target(&mut self, target: Target) {
        EvolutionSolver::set_target(self, target);
    }

    fn iterate(&mut self) -> SolveState {
        EvolutionSolver::iterate(self)
    }

    fn solve(&mut self) -> bool {
        EvolutionSolver::solve(self)
    }

    fn error(&self) -> f64 {
        EvolutionSolver::error(self)
    }

    fn set_max_iterations(&mut self, max_iterations: usize) {
        EvolutionSolver::set_max_generations(self, max_iterations);
    }

    fn set_max_error(&mut self, max_error: f64) {
        EvolutionSolver::set_max_error(self, max_error);
    }

    fn chain(&self) -> &Chain {
        EvolutionSolver::chain(self)
    }
}

/// Solver family and variant selection for [`Solver::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Jacobian with damped-least-squares pseudo-inverse deltas.
    PseudoInverse,
    /// Jacobian with selectively damped least squares.
    Sdls,
    /// Jacobian transpose with optimal scalar step.
    Transpose,
    /// Heuristic sweeps root to tip.
    TrikForward,
    /// Heuristic sweeps tip to root.
    TrikBackward,
    /// Cyclic coordinate descent (undamped tip-to-root sweeps).
    TrikCcd,
    /// Population-based evolutionary search.
    Evolutionary,
}

/// Runtime-selected solver.
pub struct Solver {
    inner: Box<dyn SolveStrategy>,
}

impl Solver {
    pub fn new(kind: StrategyKind, chain: Chain) -> Result<Self, IkError> {
        let inner: Box<dyn SolveStrategy> = match kind {
            StrategyKind::PseudoInverse => {
                Box::new(JacobianIkSolver::new(chain, LinearStrategy::pseudo_inverse()))
            }
            StrategyKind::Sdls => Box::new(JacobianIkSolver::new(chain, LinearStrategy::sdls())),
            StrategyKind::Transpose => {
                Box::new(JacobianIkSolver::new(chain, LinearStrategy::transpose()))
            }
            StrategyKind::TrikForward => Box::new(TrikSolver::new(chain, SweepOrder::Forward)),
            StrategyKind::TrikBackward => Box::new(TrikSolver::new(chain, SweepOrder::Backward)),
            StrategyKind::TrikCcd => Box::new(TrikSolver::new(chain, SweepOrder::Ccd)),
            StrategyKind::Evolutionary => {
                Box::new(EvolutionSolver::new(chain, EvolutionConfig::default())?)
            }
        };
        Ok(Self { inner })
    }

    pub fn set_target(&mut self, target: Target) {
        self.inner.set_target(target);
    }

    pub fn iterate(&mut self) -> SolveState {
        self.inner.iterate()
    }

    pub fn solve(&mut self) -> bool {
        self.inner.solve()
    }

    pub fn error(&self) -> f64 {
        self.inner.error()
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.inner.set_max_iterations(max_iterations);
    }

    pub fn set_max_error(&mut self, max_error: f64) {
        self.inner.set_max_error(max_error);
    }

    pub fn set_steps_per_tick(&mut self, steps: usize) {
        self.inner.set_steps_per_tick(steps);
    }

    pub fn chain(&self) -> &Chain {
        self.inner.chain()
    }
}
