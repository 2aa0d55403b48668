//! End-to-end convergence runs for every solver family.

use ik_solver::{
    EvolutionConfig, EvolutionSolver, JacobianIkSolver, LinearStrategy, SolveState, Solver,
    StrategyKind, SweepOrder, TrikConfig, TrikSolver,
};
use ik_types::{Chain, Mode, Target};
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

/// Reachable, off-axis target for the 100-unit planar arm (distance 90).
fn reachable_target() -> Target {
    Target::new(Vector3::new(63.64, 63.64, 0.0))
}

#[test]
fn pseudo_inverse_converges_on_planar_arm() {
    let mut solver = JacobianIkSolver::new(planar_arm(), LinearStrategy::pseudo_inverse());
    solver.set_target(reachable_target());
    solver.set_max_error(0.5);
    assert!(solver.solve());
    assert!(solver.error() < 0.5);
}

#[test]
fn sdls_converges_on_planar_arm() {
    let mut solver = JacobianIkSolver::new(planar_arm(), LinearStrategy::sdls());
    solver.set_target(reachable_target());
    solver.set_max_error(0.5);
    assert!(solver.solve());
    assert!(solver.error() < 0.5);
}

#[test]
fn transpose_converges_on_planar_arm() {
    let mut solver = JacobianIkSolver::new(planar_arm(), LinearStrategy::transpose());
    solver.set_target(reachable_target());
    solver.set_max_error(0.5);
    solver.set_max_iterations(2000);
    assert!(solver.solve());
    assert!(solver.error() < 0.5);
}

#[test]
fn trik_ccd_converges_on_planar_arm() {
    let config = TrikConfig {
        orientation_ratio: 0.0,
        twist_correction: false,
        max_error: 4e-4,
        max_iterations: 300,
        ..TrikConfig::default()
    };
    let mut solver = TrikSolver::with_config(planar_arm(), SweepOrder::Ccd, config);
    solver.set_target(reachable_target());
    assert!(solver.solve());
    assert!(solver.position_error() < 1.0);
}

#[test]
fn trik_backward_converges_on_planar_arm() {
    let config = TrikConfig {
        orientation_ratio: 0.0,
        twist_correction: false,
        max_error: 4e-4,
        max_iterations: 300,
        ..TrikConfig::default()
    };
    let mut solver = TrikSolver::with_config(planar_arm(), SweepOrder::Backward, config);
    solver.set_target(reachable_target());
    assert!(solver.solve());
    assert!(solver.position_error() < 1.0);
}

// A rank-one system is solved exactly (up to arc-versus-chord error) in a
// single iteration by both the pseudo-inverse and the scaled transpose.
#[test]
fn two_joint_arm_converges_in_one_iteration() {
    let theta = 0.15_f64;
    let target = Target::new(Vector3::new(theta.cos(), theta.sin(), 0.0));
    for strategy in [LinearStrategy::pseudo_inverse(), LinearStrategy::transpose()] {
        let chain = Chain::serial(
            Mode::Planar,
            &[Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)],
        );
        let mut solver = JacobianIkSolver::new(chain, strategy);
        solver.set_target(target);
        solver.set_max_error(0.05);
        assert_eq!(solver.iterate(), SolveState::Converged);
        assert_eq!(solver.iterations(), 1);
    }
}

#[test]
fn no_target_leaves_chain_untouched() {
    for kind in [
        StrategyKind::PseudoInverse,
        StrategyKind::Sdls,
        StrategyKind::Transpose,
        StrategyKind::TrikForward,
        StrategyKind::TrikCcd,
        StrategyKind::Evolutionary,
    ] {
        let mut solver = Solver::new(kind, planar_arm()).unwrap();
        let before = solver.chain().clone();
        assert_eq!(solver.iterate(), SolveState::NoTarget);
        assert_eq!(solver.chain(), &before);
    }
}

#[test]
fn unreachable_target_approaches_reach_sphere() {
    // Distance ~212 against a 100-unit reach: the solver cannot converge but
    // must straighten the arm toward the target instead of diverging.
    let mut solver = JacobianIkSolver::new(planar_arm(), LinearStrategy::pseudo_inverse());
    solver.set_target(Target::new(Vector3::new(150.0, 150.0, 0.0)));
    assert!(!solver.solve());
    let residual = solver.error();
    assert!(residual > 105.0 && residual < 120.0);
    assert!(solver.chain().end_effector_position().norm() > 95.0);
}

#[test]
fn evolutionary_improves_on_seeded_run() {
    let chain = Chain::serial(
        Mode::Spatial,
        &[
            Vector3::zeros(),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
        ],
    );
    let mut solver = EvolutionSolver::with_seed(chain, EvolutionConfig::default(), 7).unwrap();
    solver.set_target(Target::new(Vector3::new(1.0, 1.5, 0.5)));

    let initial = solver.error();
    solver.iterate();
    let mut previous = solver.error();
    for _ in 0..100 {
        if solver.iterate() == SolveState::Converged {
            break;
        }
        let current = solver.error();
        assert!(current <= previous);
        previous = current;
    }
    assert!(solver.error() < initial);
}

#[test]
fn front_end_solves_with_every_jacobian_kind() {
    for kind in [
        StrategyKind::PseudoInverse,
        StrategyKind::Sdls,
        StrategyKind::Transpose,
    ] {
        let mut solver = Solver::new(kind, planar_arm()).unwrap();
        solver.set_target(reachable_target());
        solver.set_max_error(1.0);
        solver.set_max_iterations(2000);
        assert!(solver.solve(), "{kind:?} failed to converge");
    }
}
