//! Per-joint corrective heuristics.
//!
//! Each heuristic adjusts exactly one joint of a trial chain toward the
//! target; the solver decides visit order and how often to run them.

use ik_types::{Chain, Mode, Target};
use nalgebra::{Unit, UnitQuaternion, Vector3};

use crate::jacobian::orthogonal_to;

const LEVER_EPSILON: f64 = 1e-9;

/// A per-joint adjustment applied during a sweep.
pub trait Heuristic {
    fn apply(&self, chain: &mut Chain, joint: usize, target: &Target);
}

/// Swing the end-effector direction toward the target direction around
/// `joint`, scaled by `damping`. With `damping = 1.0` this is the classic
/// cyclic-coordinate-descent step.
#[derive(Debug, Clone, Copy)]
pub struct AlignHeuristic {
    pub damping: f64,
}

impl Heuristic for AlignHeuristic {
    fn apply(&self, chain: &mut Chain, joint: usize, target: &Target) {
        let pivot = chain.world_position(joint);
        let to_end = chain.end_effector_position() - pivot;
        let to_target = target.position - pivot;
        if to_end.norm() < LEVER_EPSILON || to_target.norm() < LEVER_EPSILON {
            return;
        }

        let (axis, angle) = match chain.mode() {
            Mode::Planar => {
                let cross_z = to_end.x * to_target.y - to_end.y * to_target.x;
                let angle = cross_z.atan2(to_end.dot(&to_target));
                (Vector3::z_axis(), angle)
            }
            Mode::Spatial => match UnitQuaternion::rotation_between(&to_end, &to_target) {
                Some(rotation) => match rotation.axis_angle() {
                    Some(pair) => pair,
                    None => return, // already aligned
                },
                // Anti-parallel lever arms: half a turn about any orthogonal
                // axis.
                None => (orthogonal_to(&to_end), std::f64::consts::PI),
            },
        };

        chain.rotate_about_world_axis(joint, &axis, angle * self.damping);
    }
}

/// Correct the roll component of the end-effector's orientation error about
/// the joint's outgoing segment.
#[derive(Debug, Clone, Copy)]
pub struct TwistHeuristic {
    pub damping: f64,
}

impl Heuristic for TwistHeuristic {
    fn apply(&self, chain: &mut Chain, joint: usize, target: &Target) {
        // Twisting about an in-plane segment would leave the plane.
        if chain.mode() == Mode::Planar {
            return;
        }
        let next = joint + 1;
        if next >= chain.len() {
            return;
        }
        let segment = chain.world_position(next) - chain.world_position(joint);
        if segment.norm() < LEVER_EPSILON {
            return;
        }
        let direction = Unit::new_normalize(segment);

        let residual = target.orientation * chain.end_effector_orientation().inverse();
        let Some((axis, angle)) = residual.axis_angle() else {
            return;
        };
        // Project the residual rotation onto the segment: its twist component.
        let twist = angle * axis.dot(&direction);
        if twist.abs() < LEVER_EPSILON {
            return;
        }
        chain.rotate_about_world_axis(joint, &direction, twist * self.damping);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spatial_chain() -> Chain {
        Chain::serial(
            Mode::Spatial,
            &[
                Vector3::zeros(),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
            ],
        )
    }

    #[test]
    fn test_ccd_step_aligns_root_exactly() {
        let mut chain = spatial_chain();
        let target = Target::new(Vector3::new(0.0, 2.0, 0.0));
        AlignHeuristic { damping: 1.0 }.apply(&mut chain, 0, &target);
        let ee = chain.end_effector_position();
        assert!((ee - Vector3::new(0.0, 2.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_damped_step_moves_partially() {
        let mut chain = spatial_chain();
        let target = Target::new(Vector3::new(0.0, 2.0, 0.0));
        let before = (target.position - chain.end_effector_position()).norm();
        AlignHeuristic { damping: 0.5 }.apply(&mut chain, 0, &target);
        let after = (target.position - chain.end_effector_position()).norm();
        assert!(after < before);
        assert!(after > 1e-3); // did not fully align
    }

    #[test]
    fn test_align_is_a_no_op_when_on_target() {
        let mut chain = spatial_chain();
        let target = Target::new(chain.end_effector_position());
        let before = chain.clone();
        AlignHeuristic { damping: 1.0 }.apply(&mut chain, 1, &target);
        assert_eq!(chain, before);
    }

    #[test]
    fn test_planar_align_keeps_chain_in_plane() {
        let mut chain = Chain::serial(
            Mode::Planar,
            &[
                Vector3::zeros(),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
            ],
        );
        let target = Target::new(Vector3::new(0.5, 1.5, 0.0));
        AlignHeuristic { damping: 1.0 }.apply(&mut chain, 0, &target);
        assert!(chain.end_effector_position().z.abs() < 1e-12);
    }

    #[test]
    fn test_twist_reduces_roll_error() {
        let mut chain = spatial_chain();
        // Target orientation rolled a quarter turn about the chain axis.
        let roll = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::FRAC_PI_2);
        let target = Target::with_orientation(chain.end_effector_position(), roll);
        let before = chain.end_effector_orientation().angle_to(&target.orientation);
        TwistHeuristic { damping: 1.0 }.apply(&mut chain, 0, &target);
        let after = chain.end_effector_orientation().angle_to(&target.orientation);
        assert!(after < before - 1e-6);
    }

    #[test]
    fn test_twist_skips_planar_chains() {
        let mut chain = Chain::serial(
            Mode::Planar,
            &[Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)],
        );
        let roll = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.5);
        let target = Target::with_orientation(Vector3::new(1.0, 0.0, 0.0), roll);
        let before = chain.clone();
        TwistHeuristic { damping: 1.0 }.apply(&mut chain, 0, &target);
        assert_eq!(chain, before);
    }
}
