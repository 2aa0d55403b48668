//! Linear-system strategies: map a Jacobian and an error vector to a joint
//! angle delta.
//!
//! Selected at construction via [`LinearStrategy`]; the orchestrator in
//! [`super::solver`] never branches on which one is active. The numeric
//! thresholds below are empirical; they live in config structs so callers
//! can tune them, and the defaults are the values the algorithms were
//! developed with.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Config for the Moore-Penrose pseudo-inverse strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PseudoInverseConfig {
    /// Per-component cap on the delta; the whole vector is rescaled when any
    /// component exceeds it. Default 10 degrees.
    pub max_component: f64,
    /// Singular values below this are dropped by the least-squares solve.
    pub rank_epsilon: f64,
}

impl Default for PseudoInverseConfig {
    fn default() -> Self {
        Self {
            max_component: 10.0_f64.to_radians(),
            rank_epsilon: 1e-9,
        }
    }
}

/// Config for selectively damped least squares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SdlsConfig {
    /// Singular values at or below this contribute nothing (numeric rank
    /// filter). Default 1e-6.
    pub rank_epsilon: f64,
    /// Maximum angular change per iteration, both per singular direction and
    /// globally. Default 45 degrees.
    pub max_step: f64,
}

impl Default for SdlsConfig {
    fn default() -> Self {
        Self {
            rank_epsilon: 1e-6,
            max_step: 45.0_f64.to_radians(),
        }
    }
}

/// Config for the scaled Jacobian-transpose strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransposeConfig {
    /// When `(J J^T e) . (J J^T e)` falls below this, the step is zeroed
    /// instead of amplified. Default 1e-3.
    pub degeneracy_epsilon: f64,
}

impl Default for TransposeConfig {
    fn default() -> Self {
        Self {
            degeneracy_epsilon: 1e-3,
        }
    }
}

/// The linear-system strategy a Jacobian solver was constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinearStrategy {
    PseudoInverse(PseudoInverseConfig),
    Sdls(SdlsConfig),
    Transpose(TransposeConfig),
}

impl LinearStrategy {
    pub fn pseudo_inverse() -> Self {
        Self::PseudoInverse(PseudoInverseConfig::default())
    }

    pub fn sdls() -> Self {
        Self::Sdls(SdlsConfig::default())
    }

    pub fn transpose() -> Self {
        Self::Transpose(TransposeConfig::default())
    }

    /// Solve `J * delta = e` for a joint angle delta. Never returns
    /// non-finite values; degenerate systems yield a zero delta.
    pub fn solve_delta(&self, jacobian: &DMatrix<f64>, error: &DVector<f64>) -> DVector<f64> {
        match self {
            Self::PseudoInverse(config) => pseudo_inverse_delta(jacobian, error, config),
            Self::Sdls(config) => sdls_delta(jacobian, error, config),
            Self::Transpose(config) => transpose_delta(jacobian, error, config),
        }
    }
}

// ── Pseudo-inverse ───────────────────────────────────────────────────────────

fn pseudo_inverse_delta(
    jacobian: &DMatrix<f64>,
    error: &DVector<f64>,
    config: &PseudoInverseConfig,
) -> DVector<f64> {
    let columns = jacobian.ncols();
    let svd = jacobian.clone().svd(true, true);
    let delta = match svd.solve(error, config.rank_epsilon) {
        Ok(delta) => delta,
        Err(_) => return DVector::zeros(columns),
    };
    rescale_to_cap(delta, config.max_component)
}

// ── Selectively damped least squares ─────────────────────────────────────────

fn sdls_delta(jacobian: &DMatrix<f64>, error: &DVector<f64>, config: &SdlsConfig) -> DVector<f64> {
    let columns = jacobian.ncols();
    let svd = jacobian.clone().svd(true, true);
    let (Some(u), Some(v_t)) = (&svd.u, &svd.v_t) else {
        return DVector::zeros(columns);
    };

    // Each joint's total influence magnitude is the norm of its column.
    let column_norms: Vec<f64> = (0..columns).map(|c| jacobian.column(c).norm()).collect();

    let mut delta = DVector::zeros(columns);
    for i in 0..svd.singular_values.len() {
        let sigma = svd.singular_values[i];
        if sigma <= config.rank_epsilon {
            continue;
        }

        let alpha: f64 = u
            .column(i)
            .iter()
            .zip(error.iter())
            .map(|(ui, ei)| ui * ei)
            .sum();

        // Coverage of the target directions by this output singular vector.
        let coverage = u.column(i).norm();
        // Aggregate joint influence along this input singular vector.
        let influence: f64 = (0..columns)
            .map(|c| v_t[(i, c)].abs() * column_norms[c])
            .sum::<f64>()
            / sigma;

        let ratio = if influence > 0.0 {
            (coverage / influence).min(1.0)
        } else {
            1.0
        };
        let gamma = config.max_step * ratio;

        let contribution = DVector::from_fn(columns, |c, _| (alpha / sigma) * v_t[(i, c)]);
        let peak = contribution.amax();
        let damping = gamma / (gamma + peak);
        delta += contribution * damping;
    }

    rescale_to_cap(delta, config.max_step)
}

// ── Jacobian transpose ───────────────────────────────────────────────────────

fn transpose_delta(
    jacobian: &DMatrix<f64>,
    error: &DVector<f64>,
    config: &TransposeConfig,
) -> DVector<f64> {
    let delta = jacobian.transpose() * error;
    let jjt_e = jacobian * &delta;
    let denominator = jjt_e.dot(&jjt_e);
    if denominator < config.degeneracy_epsilon {
        return DVector::zeros(jacobian.ncols());
    }
    let scale = error.dot(&jjt_e) / denominator;
    delta * scale
}

/// Uniformly rescale `delta` so its largest absolute component is at most
/// `cap`, preserving direction.
fn rescale_to_cap(delta: DVector<f64>, cap: f64) -> DVector<f64> {
    let peak = delta.amax();
    if peak > cap && peak > 0.0 {
        delta * (cap / peak)
    } else {
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pseudo_inverse_solves_exact_system() {
        // Identity-like Jacobian: delta should reproduce the error.
        let jacobian = DMatrix::from_row_slice(3, 3, &[
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ]);
        let error = DVector::from_row_slice(&[0.1, -0.05, 0.02]);
        let delta = LinearStrategy::pseudo_inverse().solve_delta(&jacobian, &error);
        for i in 0..3 {
            assert_relative_eq!(delta[i], error[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_pseudo_inverse_rescales_large_components() {
        let jacobian = DMatrix::from_row_slice(3, 1, &[1.0, 0.0, 0.0]);
        let error = DVector::from_row_slice(&[10.0, 0.0, 0.0]);
        let config = PseudoInverseConfig::default();
        let delta = LinearStrategy::pseudo_inverse().solve_delta(&jacobian, &error);
        assert_relative_eq!(delta.amax(), config.max_component, epsilon = 1e-12);
    }

    #[test]
    fn test_sdls_skips_singular_values_below_threshold() {
        // Second column is identically zero: its singular value is zero and
        // the corresponding joint must receive no delta.
        let jacobian = DMatrix::from_row_slice(3, 2, &[
            1.0, 0.0, //
            0.0, 0.0, //
            0.0, 0.0,
        ]);
        let error = DVector::from_row_slice(&[1.0, 0.0, 0.0]);
        let delta = LinearStrategy::sdls().solve_delta(&jacobian, &error);
        assert_eq!(delta[1], 0.0);
        assert!(delta[0] > 0.0);
    }

    #[test]
    fn test_sdls_global_cap() {
        let config = SdlsConfig::default();
        let jacobian = DMatrix::from_row_slice(3, 1, &[0.01, 0.0, 0.0]);
        let error = DVector::from_row_slice(&[100.0, 0.0, 0.0]);
        let delta = LinearStrategy::sdls().solve_delta(&jacobian, &error);
        assert!(delta.amax() <= config.max_step + 1e-12);
    }

    #[test]
    fn test_transpose_zeroes_near_singular_step() {
        // Zero Jacobian (end-effector coincident with every joint):
        // the denominator vanishes and the delta must be exactly zero.
        let jacobian = DMatrix::zeros(3, 2);
        let error = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        let delta = LinearStrategy::transpose().solve_delta(&jacobian, &error);
        assert_eq!(delta[0], 0.0);
        assert_eq!(delta[1], 0.0);
    }

    #[test]
    fn test_transpose_scaling_is_optimal_for_single_column() {
        // One column c: the scale reduces to 1/|c|^2, matching the
        // pseudo-inverse for rank-one systems.
        let jacobian = DMatrix::from_row_slice(3, 1, &[0.0, 2.0, 0.0]);
        let error = DVector::from_row_slice(&[0.0, 0.5, 0.0]);
        let delta = LinearStrategy::transpose().solve_delta(&jacobian, &error);
        assert_relative_eq!(delta[0], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_all_strategies_finite_on_degenerate_input() {
        let jacobian = DMatrix::zeros(3, 3);
        let error = DVector::from_row_slice(&[1.0, 1.0, 1.0]);
        for strategy in [
            LinearStrategy::pseudo_inverse(),
            LinearStrategy::sdls(),
            LinearStrategy::transpose(),
        ] {
            let delta = strategy.solve_delta(&jacobian, &error);
            assert!(delta.iter().all(|v| v.is_finite()));
        }
    }
}
