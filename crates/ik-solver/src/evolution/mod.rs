//! Population-based evolutionary IK solver.
//!
//! Maintains a fitness-sorted population of independent chain copies and
//! advances it one generation per [`EvolutionSolver::iterate`] call:
//! local exploitation of the elite subset, ranking selection plus
//! recombination/mutation/adoption for the remaining slots, rank-derived
//! extinction factors, and a periodic stagnation-escape that reseeds the
//! population around the incumbent best. Supports multiple simultaneous
//! end-effector targets through [`ChainTargets`].

pub mod individual;
pub mod operators;

use ik_types::{Chain, ChainTargets, Target};
use nalgebra::UnitQuaternion;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::IkError;
use crate::evolution::individual::{chain_fitness, Individual};
use crate::evolution::operators::{Adoption, Mutation, Operator, Recombination, RankingSelection};
use crate::SolveState;

/// Cap on exploitation/probe step size, so early generations with large
/// fitness values do not spin joints through full turns.
const MAX_EXPLOIT_STEP: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub population_size: usize,
    /// Individuals protected from replacement and exploited locally.
    pub elite_count: usize,
    /// Generation budget for [`EvolutionSolver::solve`].
    pub max_generations: usize,
    /// Best-fitness threshold for convergence.
    pub max_error: f64,
    /// Weight of orientation error in fitness (0.0 = position only).
    pub orientation_weight: f64,
    /// Base mutation magnitude in radians, scaled by extinction.
    pub mutation_strength: f64,
    /// Upper bound on the adoption blend weight.
    pub adoption_rate: f64,
    /// Generations between stagnation probes; 0 disables the wipe.
    pub wipe_period: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 12,
            elite_count: 3,
            max_generations: 200,
            max_error: 0.01,
            orientation_weight: 0.0,
            mutation_strength: 0.6,
            adoption_rate: 0.2,
            wipe_period: 10,
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<(), IkError> {
        if self.population_size < 2 {
            return Err(IkError::PopulationTooSmall {
                min: 2,
                got: self.population_size,
            });
        }
        if self.elite_count >= self.population_size {
            return Err(IkError::TooManyElites {
                elites: self.elite_count,
                population: self.population_size,
            });
        }
        if !self.max_error.is_finite() || self.max_error <= 0.0 {
            return Err(IkError::InvalidConfig {
                name: "max_error",
                value: self.max_error,
            });
        }
        if !self.mutation_strength.is_finite() || self.mutation_strength <= 0.0 {
            return Err(IkError::InvalidConfig {
                name: "mutation_strength",
                value: self.mutation_strength,
            });
        }
        Ok(())
    }
}

/// Fixed-size population kept sorted ascending by fitness.
#[derive(Debug, Clone, Default)]
pub struct Population {
    individuals: Vec<Individual>,
}

impl Population {
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// The fittest individual, or `None` before the first generation.
    pub fn best(&self) -> Option<&Individual> {
        self.individuals.first()
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn is_sorted_by_fitness(&self) -> bool {
        self.individuals
            .windows(2)
            .all(|pair| pair[0].fitness <= pair[1].fitness)
    }

    fn get(&self, index: usize) -> &Individual {
        &self.individuals[index]
    }

    fn get_mut(&mut self, index: usize) -> &mut Individual {
        &mut self.individuals[index]
    }

    fn sort(&mut self) {
        self.individuals
            .sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
    }

    /// Rank-derived extinction: the best individual mutates least, the worst
    /// most.
    fn recompute_extinction(&mut self) {
        let count = self.individuals.len();
        for (rank, individual) in self.individuals.iter_mut().enumerate() {
            individual.extinction = (rank + 1) as f64 / count as f64;
        }
    }
}

/// Generational evolutionary solver with elitism and local exploitation.
#[derive(Debug)]
pub struct EvolutionSolver {
    /// Externally visible chain: mirrors the best individual found.
    chain: Chain,
    targets: ChainTargets,
    population: Population,
    config: EvolutionConfig,
    rng: StdRng,
    recombination: Recombination,
    mutation: Mutation,
    adoption: Adoption,
    selection: RankingSelection,
    generation: usize,
    best_fitness: f64,
    initialized: bool,
}

impl EvolutionSolver {
    pub fn new(chain: Chain, config: EvolutionConfig) -> Result<Self, IkError> {
        config.validate()?;
        let targets = ChainTargets::new(chain.len());
        Ok(Self {
            chain,
            targets,
            population: Population::default(),
            rng: StdRng::from_entropy(),
            recombination: Recombination::new(),
            mutation: Mutation::new(config.mutation_strength),
            adoption: Adoption::new(config.adoption_rate),
            selection: RankingSelection,
            generation: 0,
            best_fitness: f64::INFINITY,
            initialized: false,
            config,
        })
    }

    /// Deterministic variant for tests and reproducible runs.
    pub fn with_seed(chain: Chain, config: EvolutionConfig, seed: u64) -> Result<Self, IkError> {
        let mut solver = Self::new(chain, config)?;
        solver.rng = StdRng::seed_from_u64(seed);
        Ok(solver)
    }

    /// Bind a target to an arbitrary joint index (multi-end-effector).
    pub fn set_joint_target(&mut self, index: usize, target: Target) {
        self.targets.set(index, target);
        self.initialized = false;
    }

    /// Bind a target to the end-effector.
    pub fn set_target(&mut self, target: Target) {
        let last = self.targets.len().saturating_sub(1);
        self.set_joint_target(last, target);
    }

    pub fn set_targets(&mut self, targets: ChainTargets) {
        assert!(
            targets.len() == self.chain.len(),
            "target map length must match chain length"
        );
        self.targets = targets;
        self.initialized = false;
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn set_max_generations(&mut self, max_generations: usize) {
        self.config.max_generations = max_generations;
    }

    pub fn set_max_error(&mut self, max_error: f64) {
        self.config.max_error = max_error;
    }

    /// Best fitness found so far (current chain fitness before the first
    /// generation, zero when no target is bound).
    pub fn error(&self) -> f64 {
        if self.targets.is_empty() {
            return 0.0;
        }
        if self.initialized {
            self.best_fitness
        } else {
            chain_fitness(&self.chain, &self.targets, self.config.orientation_weight)
        }
    }

    /// Reinitialize the population: the current chain seeds slot zero, the
    /// rest start from uniformly random joint rotations.
    pub fn reset(&mut self) {
        let weight = self.config.orientation_weight;
        let mut individuals = Vec::with_capacity(self.config.population_size);

        let mut seed = Individual::new(self.chain.clone());
        seed.evaluate(&self.targets, weight);
        individuals.push(seed);

        for _ in 1..self.config.population_size {
            let mut individual = Individual::new(self.chain.clone());
            for gene in 0..individual.gene_count() {
                if !individual.gene_is_free(gene) {
                    continue;
                }
                let angle = self.rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
                individual.set_gene(gene, angle);
            }
            individual.evaluate(&self.targets, weight);
            individuals.push(individual);
        }

        self.population = Population { individuals };
        self.population.sort();
        self.population.recompute_extinction();
        self.best_fitness = self.population.get(0).fitness;
        self.chain = self.population.get(0).chain.clone();
        self.generation = 0;
        self.initialized = true;
        debug!(best = self.best_fitness, "population initialized");
    }

    /// Advance one generation.
    pub fn iterate(&mut self) -> SolveState {
        if self.targets.is_empty() {
            return SolveState::NoTarget;
        }
        if self.chain.len() < 2 {
            return SolveState::Converged;
        }
        if !self.initialized {
            self.reset();
        }

        let size = self.population.len();
        let elite_count = self.config.elite_count.min(size - 1);

        // 1. Local exploitation of the elite subset.
        for index in 0..elite_count.max(1) {
            self.exploit(index);
        }
        self.population.sort();

        // 2. Offspring for the remaining slots.
        let best = self.population.get(0).clone();
        self.adoption.prepare_best(&best);
        let mut offspring = Vec::with_capacity(size - elite_count);
        for _ in elite_count..size {
            let first = self.selection.select(size, &mut self.rng);
            let second = self.selection.select(size, &mut self.rng);
            let parent_a = self.population.get(first).clone();
            let parent_b = self.population.get(second).clone();
            self.recombination.prepare_parents(&parent_a, &parent_b);
            self.mutation.prepare_parents(&parent_a, &parent_b);

            let mut child = parent_a;
            self.recombination.apply(&mut child, &mut self.rng);
            self.mutation.apply(&mut child, &mut self.rng);
            self.adoption.apply(&mut child, &mut self.rng);
            child.evaluate(&self.targets, self.config.orientation_weight);
            offspring.push(child);
        }

        // 3. Replace the non-elite slots, re-sort, refresh best and
        // extinction factors.
        for (slot, child) in (elite_count..size).zip(offspring) {
            *self.population.get_mut(slot) = child;
        }
        self.population.sort();
        self.population.recompute_extinction();
        if self.population.get(0).fitness < self.best_fitness {
            self.best_fitness = self.population.get(0).fitness;
            self.chain = self.population.get(0).chain.clone();
        }

        self.generation += 1;

        // 4. Periodic stagnation escape.
        if self.config.wipe_period > 0
            && self.generation % self.config.wipe_period == 0
            && !self.probe_best()
        {
            self.reseed_from_best();
        }

        if self.best_fitness < self.config.max_error {
            SolveState::Converged
        } else {
            SolveState::Iterating
        }
    }

    /// Run generations until convergence or the budget is spent.
    #[instrument(skip(self))]
    pub fn solve(&mut self) -> bool {
        loop {
            match self.iterate() {
                SolveState::NoTarget | SolveState::Converged => {
                    debug!(generation = self.generation, best = self.best_fitness, "converged");
                    return true;
                }
                SolveState::Iterating => {}
            }
            if self.generation >= self.config.max_generations {
                break;
            }
        }
        debug!(best = self.best_fitness, "generation budget exhausted");
        self.best_fitness < self.config.max_error
    }

    /// Per-DOF hill climb on one individual: try each Euler component at
    /// plus/minus a random fraction of the current fitness, keep the best of
    /// the three candidates, and record the retained delta as the gradient.
    fn exploit(&mut self, index: usize) {
        let weight = self.config.orientation_weight;
        let mut individual = self.population.get(index).clone();
        for gene in 0..individual.gene_count() {
            if !individual.gene_is_free(gene) {
                continue;
            }
            let baseline = individual.fitness;
            let step = self.rng.gen_range(0.0..1.0) * baseline.min(MAX_EXPLOIT_STEP);
            if step <= 0.0 {
                individual.gradient[gene] = 0.0;
                continue;
            }
            let original = individual.gene(gene);

            individual.set_gene(gene, original + step);
            individual.evaluate(&self.targets, weight);
            let plus = individual.fitness;

            individual.set_gene(gene, original - step);
            individual.evaluate(&self.targets, weight);
            let minus = individual.fitness;

            if plus < baseline && plus <= minus {
                individual.set_gene(gene, original + step);
                individual.fitness = plus;
                individual.gradient[gene] = step;
            } else if minus < baseline {
                // The gene already holds original - step.
                individual.fitness = minus;
                individual.gradient[gene] = -step;
            } else {
                individual.set_gene(gene, original);
                individual.fitness = baseline;
                individual.gradient[gene] = 0.0;
            }
        }
        *self.population.get_mut(index) = individual;
    }

    /// Perturb each joint of the incumbent best by a random rotation
    /// proportional to its fitness and report whether any perturbation
    /// strictly improved it. Every probe restores the joint's exact
    /// pre-probe rotation before moving on.
    fn probe_best(&mut self) -> bool {
        let weight = self.config.orientation_weight;
        let baseline = self.population.get(0).fitness;
        let scale = baseline.min(MAX_EXPLOIT_STEP);
        let planar = matches!(self.chain.mode(), ik_types::Mode::Planar);
        let mut improved = false;

        for joint in 0..self.chain.len() {
            let (roll, pitch, yaw) = if planar {
                (0.0, 0.0, self.rng.gen_range(-1.0..1.0) * scale)
            } else {
                (
                    self.rng.gen_range(-1.0..1.0) * scale,
                    self.rng.gen_range(-1.0..1.0) * scale,
                    self.rng.gen_range(-1.0..1.0) * scale,
                )
            };
            let perturbation = UnitQuaternion::from_euler_angles(roll, pitch, yaw);

            let targets = &self.targets;
            let best = self.population.get_mut(0);
            let saved = best.chain.joint(joint).orientation;
            best.chain.joint_mut(joint).rotate(&perturbation);
            best.evaluate(targets, weight);
            if best.fitness < baseline {
                improved = true;
            }
            best.chain.joint_mut(joint).set_orientation(saved);
            best.fitness = baseline;
        }
        improved
    }

    /// Reseed every non-best slot with a jittered copy of the best
    /// individual.
    fn reseed_from_best(&mut self) {
        debug!(
            generation = self.generation,
            best = self.best_fitness,
            "stagnation detected, reseeding population from best"
        );
        let weight = self.config.orientation_weight;
        let best = self.population.get(0).clone();
        let scale = best.fitness.min(MAX_EXPLOIT_STEP);

        for slot in 1..self.population.len() {
            let mut fresh = best.clone();
            for gene in 0..fresh.gene_count() {
                if !fresh.gene_is_free(gene) {
                    continue;
                }
                let jitter = self.rng.gen_range(-1.0..1.0) * scale;
                fresh.set_gene(gene, fresh.gene(gene) + jitter);
            }
            fresh.evaluate(&self.targets, weight);
            *self.population.get_mut(slot) = fresh;
        }
        self.population.sort();
        self.population.recompute_extinction();
    }
}
