//! Iterative inverse-kinematics solving engine.
//!
//! Three solver families drive a [`Chain`](ik_types::Chain) end-effector
//! toward a [`Target`](ik_types::Target):
//!
//! - [`jacobian`]: builds a Jacobian per iteration and solves for a joint
//!   delta with a pluggable linear-system strategy (pseudo-inverse, SDLS,
//!   transpose).
//! - [`trik`]: sweeps per-joint corrective heuristics over a working copy of
//!   the chain, committing only strict improvements.
//! - [`evolution`]: a generational population search with selection,
//!   recombination, mutation, adoption and local exploitation.
//!
//! All solvers are synchronous and single-threaded; the caller decides when
//! to tick them. [`Solver`] offers a unified front-end over the families,
//! selected by [`StrategyKind`] at construction.

pub mod error;
pub mod evolution;
pub mod jacobian;
pub mod solver;
pub mod trik;

pub use error::IkError;
pub use evolution::{EvolutionConfig, EvolutionSolver};
pub use jacobian::solver::{JacobianIkSolver, SolverConfig};
pub use jacobian::strategy::LinearStrategy;
pub use solver::{SolveStrategy, Solver, StrategyKind};
pub use trik::{SweepOrder, TrikConfig, TrikSolver};

/// Outcome of one solver iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveState {
    /// No target bound; the iteration is a documented no-op and the chain is
    /// left untouched.
    NoTarget,
    /// Progress was made but the error is still above threshold.
    Iterating,
    /// The error is below the configured threshold (or the chain is too
    /// short for any iteration to be meaningful).
    Converged,
}

impl SolveState {
    /// Whether the caller can stop ticking the solver.
    pub fn is_done(self) -> bool {
        !matches!(self, SolveState::Iterating)
    }
}
