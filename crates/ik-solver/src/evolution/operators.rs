//! Variation operators for offspring production.
//!
//! The trait carries explicit `prepare_parents`/`prepare_best` hooks so the
//! generation loop can feed each operator the context it needs without
//! inspecting concrete types.

use rand::rngs::StdRng;
use rand::Rng;

use crate::evolution::individual::Individual;

/// An operator applied to a freshly cloned offspring.
pub trait Operator {
    /// Receives the two selected parents before `apply`.
    fn prepare_parents(&mut self, _first: &Individual, _second: &Individual) {}
    /// Receives the incumbent best individual before `apply`.
    fn prepare_best(&mut self, _best: &Individual) {}
    fn apply(&self, child: &mut Individual, rng: &mut StdRng);
}

/// Uniform crossover: each gene has an even chance of coming from the
/// second parent (the child starts as a clone of the first).
#[derive(Debug, Default)]
pub struct Recombination {
    partner_genes: Vec<f64>,
}

impl Recombination {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for Recombination {
    fn prepare_parents(&mut self, _first: &Individual, second: &Individual) {
        self.partner_genes = second.genes();
    }

    fn apply(&self, child: &mut Individual, rng: &mut StdRng) {
        for (index, gene) in self.partner_genes.iter().enumerate() {
            if child.gene_is_free(index) && rng.gen_bool(0.5) {
                child.set_gene(index, *gene);
            }
        }
    }
}

/// Random perturbation whose magnitude is modulated by the offspring's
/// extinction factor (derived from the parents' spread) and biased by the
/// first parent's exploitation gradient.
#[derive(Debug)]
pub struct Mutation {
    pub strength: f64,
    offspring_extinction: f64,
    gradient: Vec<f64>,
}

impl Mutation {
    pub fn new(strength: f64) -> Self {
        Self {
            strength,
            offspring_extinction: 1.0,
            gradient: Vec::new(),
        }
    }
}

impl Operator for Mutation {
    fn prepare_parents(&mut self, first: &Individual, second: &Individual) {
        self.offspring_extinction = 0.5 * (first.extinction + second.extinction);
        self.gradient = first.gradient.clone();
    }

    fn apply(&self, child: &mut Individual, rng: &mut StdRng) {
        child.extinction = self.offspring_extinction;
        for index in 0..child.gene_count() {
            if !child.gene_is_free(index) {
                continue;
            }
            let noise = rng.gen_range(-1.0..1.0) * self.strength * self.offspring_extinction;
            let bias = self.gradient.get(index).copied().unwrap_or(0.0) * rng.gen_range(0.0..1.0);
            child.set_gene(index, child.gene(index) + noise + bias);
        }
    }
}

/// Pulls the offspring a random fraction of the way toward the incumbent
/// best individual.
#[derive(Debug)]
pub struct Adoption {
    pub rate: f64,
    best_genes: Vec<f64>,
}

impl Adoption {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            best_genes: Vec::new(),
        }
    }
}

impl Operator for Adoption {
    fn prepare_best(&mut self, best: &Individual) {
        self.best_genes = best.genes();
    }

    fn apply(&self, child: &mut Individual, rng: &mut StdRng) {
        if self.best_genes.is_empty() || self.rate <= 0.0 {
            return;
        }
        let weight = rng.gen_range(0.0..self.rate);
        for (index, best_gene) in self.best_genes.iter().enumerate() {
            if !child.gene_is_free(index) {
                continue;
            }
            let blended = (1.0 - weight) * child.gene(index) + weight * best_gene;
            child.set_gene(index, blended);
        }
    }
}

/// Ranking selection over a fitness-sorted population: two uniform draws,
/// keep the better rank.
#[derive(Debug, Default)]
pub struct RankingSelection;

impl RankingSelection {
    pub fn select(&self, population_len: usize, rng: &mut StdRng) -> usize {
        let first = rng.gen_range(0..population_len);
        let second = rng.gen_range(0..population_len);
        first.min(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ik_types::{Chain, Mode};
    use nalgebra::Vector3;
    use rand::SeedableRng;

    fn individual() -> Individual {
        Individual::new(Chain::serial(
            Mode::Spatial,
            &[Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)],
        ))
    }

    #[test]
    fn test_recombination_mixes_parent_genes() {
        let first = individual();
        let mut second = individual();
        for g in 0..second.gene_count() {
            second.set_gene(g, 1.0);
        }
        let mut op = Recombination::new();
        op.prepare_parents(&first, &second);

        let mut saw_second = false;
        let mut saw_first = false;
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut child = first.clone();
            op.apply(&mut child, &mut rng);
            let from_second = child
                .genes()
                .iter()
                .filter(|g| (**g - 1.0).abs() < 1e-6)
                .count();
            saw_second |= from_second > 0;
            saw_first |= from_second < child.gene_count();
        }
        assert!(saw_second);
        assert!(saw_first);
    }

    #[test]
    fn test_mutation_extinction_from_parent_spread() {
        let mut first = individual();
        let mut second = individual();
        first.extinction = 0.2;
        second.extinction = 0.8;
        let mut op = Mutation::new(0.5);
        op.prepare_parents(&first, &second);
        let mut child = first.clone();
        let mut rng = StdRng::seed_from_u64(7);
        op.apply(&mut child, &mut rng);
        assert!((child.extinction - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_adoption_moves_child_toward_best() {
        let mut best = individual();
        for g in 0..best.gene_count() {
            best.set_gene(g, 0.5);
        }
        let mut op = Adoption::new(1.0);
        op.prepare_best(&best);
        let mut child = individual();
        let before: f64 = child.genes().iter().map(|g| (g - 0.5).abs()).sum();
        let mut rng = StdRng::seed_from_u64(123);
        op.apply(&mut child, &mut rng);
        let after: f64 = child.genes().iter().map(|g| (g - 0.5).abs()).sum();
        assert!(after <= before);
    }

    #[test]
    fn test_ranking_selection_biases_low_indices() {
        let mut rng = StdRng::seed_from_u64(99);
        let selection = RankingSelection;
        let draws = 2000;
        let hits = (0..draws)
            .filter(|_| selection.select(10, &mut rng) < 5)
            .count();
        // min-of-two gives the lower half a 75% chance.
        assert!(hits > draws / 2);
    }
}
