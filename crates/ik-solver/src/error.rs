use thiserror::Error;

/// Construction-time validation failures.
///
/// Ordinary numeric edge cases (degenerate axes, singular Jacobians,
/// unreachable targets) never surface here; they are absorbed defensively
/// inside the solvers.
#[derive(Debug, Error)]
pub enum IkError {
    #[error("population size must be at least {min} (got {got})")]
    PopulationTooSmall { min: usize, got: usize },

    #[error("elite count {elites} must be smaller than population size {population}")]
    TooManyElites { elites: usize, population: usize },

    #[error("configuration value `{name}` must be finite and positive (got {value})")]
    InvalidConfig { name: &'static str, value: f64 },
}
