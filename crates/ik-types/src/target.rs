use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Desired world pose for one end-effector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Target {
    /// Position-only target with identity orientation.
    pub fn new(position: Vector3<f64>) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
        }
    }

    pub fn with_orientation(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Position and orientation both within `epsilon`. Used by solvers to
    /// detect that a cached target snapshot has gone stale.
    pub fn approx_eq(&self, other: &Target, epsilon: f64) -> bool {
        (self.position - other.position).norm() <= epsilon
            && self.orientation.angle_to(&other.orientation) <= epsilon
    }
}

/// Sparse association from chain joint index to target, aligned to the chain
/// length. Multi-end-effector solvers read every populated slot; single-target
/// solvers populate only the end-effector slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTargets {
    slots: Vec<Option<Target>>,
}

impl ChainTargets {
    pub fn new(chain_len: usize) -> Self {
        Self {
            slots: vec![None; chain_len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no slot holds a target.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    pub fn set(&mut self, index: usize, target: Target) {
        assert!(index < self.slots.len(), "target index out of range");
        self.slots[index] = Some(target);
    }

    pub fn clear(&mut self, index: usize) {
        assert!(index < self.slots.len(), "target index out of range");
        self.slots[index] = None;
    }

    pub fn get(&self, index: usize) -> Option<&Target> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    /// Populated slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Target)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|t| (i, t)))
    }
}
