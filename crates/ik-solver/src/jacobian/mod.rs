//! Jacobian assembly for a kinematic chain.
//!
//! For every free joint a world-space rotation axis is derived, and one
//! matrix column maps that joint's angular rate to end-effector linear
//! velocity. The axis array is kept alongside the matrix so the solved
//! delta can be applied back as per-joint axis-angle rotations.

pub mod solver;
pub mod strategy;

use ik_types::{Chain, Mode};
use nalgebra::{DMatrix, Unit, Vector3};

/// Cross products with a norm below this are treated as degenerate
/// (joint, end-effector and target colinear).
const AXIS_EPSILON: f64 = 1e-9;

/// A Jacobian matrix plus the per-joint axes it was built around.
/// Ephemeral: rebuilt on every iteration, never persisted.
#[derive(Debug, Clone)]
pub struct JacobianArm {
    /// `3 x (chain.len() - 1)` matrix mapping joint angular rates to
    /// end-effector linear velocity.
    pub matrix: DMatrix<f64>,
    /// World-space rotation axis chosen for each free joint.
    pub axes: Vec<Unit<Vector3<f64>>>,
}

/// Build the Jacobian of `chain` with respect to `target`.
///
/// The end-effector contributes no column, so the matrix always has
/// `chain.len() - 1` columns.
pub fn build(chain: &Chain, target: &Vector3<f64>) -> JacobianArm {
    let columns = chain.len().saturating_sub(1);
    let poses = chain.world_poses();
    let end = poses.last().map(|(p, _)| *p).unwrap_or_else(Vector3::zeros);

    let mut matrix = DMatrix::zeros(3, columns);
    let mut axes = Vec::with_capacity(columns);

    for j in 0..columns {
        let joint_position = poses[j].0;
        let to_end = end - joint_position;
        let axis = match chain.mode() {
            Mode::Planar => Vector3::z_axis(),
            Mode::Spatial => rotation_axis(&to_end, &(target - joint_position)),
        };
        let column = axis.cross(&to_end);
        matrix.column_mut(j).copy_from(&column);
        axes.push(axis);
    }

    JacobianArm { matrix, axes }
}

/// Axis that rotates the end-effector toward the target around `joint`:
/// the normalized cross product of the two lever arms, with an arbitrary
/// orthogonal fallback for the colinear case.
fn rotation_axis(to_end: &Vector3<f64>, to_target: &Vector3<f64>) -> Unit<Vector3<f64>> {
    let cross = to_end.cross(to_target);
    if cross.norm() > AXIS_EPSILON {
        Unit::new_normalize(cross)
    } else {
        orthogonal_to(to_end)
    }
}

/// Any unit vector orthogonal to `v`. Falls back to Z when `v` itself is
/// near-zero (end-effector coincident with the joint).
pub(crate) fn orthogonal_to(v: &Vector3<f64>) -> Unit<Vector3<f64>> {
    let smallest = if v.x.abs() <= v.y.abs() && v.x.abs() <= v.z.abs() {
        Vector3::x()
    } else if v.y.abs() <= v.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let cross = v.cross(&smallest);
    if cross.norm() > AXIS_EPSILON {
        Unit::new_normalize(cross)
    } else {
        Vector3::z_axis()
    }
}
