//! A candidate chain configuration and its fitness.

use ik_types::{Chain, ChainTargets, Mode};
use nalgebra::UnitQuaternion;

/// Fitness of a chain against every populated target slot: summed
/// end-effector distance plus weighted orientation error.
pub fn chain_fitness(chain: &Chain, targets: &ChainTargets, orientation_weight: f64) -> f64 {
    let poses = chain.world_poses();
    let mut total = 0.0;
    for (index, target) in targets.iter() {
        if index >= poses.len() {
            continue;
        }
        let (position, orientation) = poses[index];
        total += (target.position - position).norm();
        if orientation_weight > 0.0 {
            total += orientation_weight * orientation.angle_to(&target.orientation);
        }
    }
    total
}

/// One member of the evolutionary population: an independent copy of the
/// chain, its fitness, an adaptive extinction factor and the per-DOF
/// gradient recorded by local exploitation.
///
/// The genome is the chain's joint rotations viewed as Euler angles, three
/// genes per joint.
#[derive(Debug, Clone)]
pub struct Individual {
    pub chain: Chain,
    pub fitness: f64,
    pub extinction: f64,
    pub gradient: Vec<f64>,
}

impl Individual {
    pub fn new(chain: Chain) -> Self {
        let gradient = vec![0.0; 3 * chain.len()];
        Self {
            chain,
            fitness: f64::INFINITY,
            extinction: 1.0,
            gradient,
        }
    }

    pub fn gene_count(&self) -> usize {
        3 * self.chain.len()
    }

    /// Planar chains only expose the yaw gene of each joint; the other two
    /// would rotate the chain out of its plane.
    pub fn gene_is_free(&self, index: usize) -> bool {
        match self.chain.mode() {
            Mode::Planar => index % 3 == 2,
            Mode::Spatial => true,
        }
    }

    pub fn gene(&self, index: usize) -> f64 {
        let (roll, pitch, yaw) = self.chain.joint(index / 3).orientation.euler_angles();
        match index % 3 {
            0 => roll,
            1 => pitch,
            _ => yaw,
        }
    }

    pub fn set_gene(&mut self, index: usize, value: f64) {
        let joint = self.chain.joint_mut(index / 3);
        let (mut roll, mut pitch, mut yaw) = joint.orientation.euler_angles();
        match index % 3 {
            0 => roll = value,
            1 => pitch = value,
            _ => yaw = value,
        }
        joint.set_orientation(UnitQuaternion::from_euler_angles(roll, pitch, yaw));
    }

    pub fn genes(&self) -> Vec<f64> {
        (0..self.gene_count()).map(|g| self.gene(g)).collect()
    }

    pub fn evaluate(&mut self, targets: &ChainTargets, orientation_weight: f64) {
        self.fitness = chain_fitness(&self.chain, targets, orientation_weight);
    }
}
