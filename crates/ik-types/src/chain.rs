use nalgebra::{Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::joint::Joint;

/// Whether a chain rotates freely in 3D or is confined to the XY plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Rotation restricted to the Z axis (the 2-DOF case).
    Planar,
    /// Unrestricted rotation (the 3-DOF case).
    Spatial,
}

/// Max and average inter-joint distance, recomputed on solver resets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub max: f64,
    pub average: f64,
}

/// An ordered kinematic chain stored as a joint arena plus parent indices.
///
/// Invariant: a joint's parent always precedes it in the arena, so world
/// poses can be computed in a single forward pass. The last joint is the
/// end-effector; it contributes no free Jacobian column, so solvers operate
/// on `len() - 1` degrees of freedom and require `len() >= 2` to do any work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    joints: Vec<Joint>,
    parents: Vec<Option<usize>>,
    mode: Mode,
}

impl Chain {
    pub fn new(mode: Mode) -> Self {
        Self {
            joints: Vec::new(),
            parents: Vec::new(),
            mode,
        }
    }

    /// Build a serial chain from parent-relative offsets. The first offset
    /// places the root; each subsequent joint is parented to its predecessor.
    pub fn serial(mode: Mode, offsets: &[Vector3<f64>]) -> Self {
        let mut chain = Self::new(mode);
        for offset in offsets {
            chain.push(Joint::new(*offset));
        }
        chain
    }

    /// Append a joint parented to the current last joint (or as root when
    /// the chain is empty). Returns the new joint's index.
    pub fn push(&mut self, joint: Joint) -> usize {
        let parent = self.joints.len().checked_sub(1);
        self.joints.push(joint);
        self.parents.push(parent);
        self.joints.len() - 1
    }

    /// Append a joint under an explicit parent.
    pub fn push_child(&mut self, joint: Joint, parent: usize) -> usize {
        assert!(parent < self.joints.len(), "parent index out of range");
        self.joints.push(joint);
        self.parents.push(Some(parent));
        self.joints.len() - 1
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn joint(&self, index: usize) -> &Joint {
        &self.joints[index]
    }

    pub fn joint_mut(&mut self, index: usize) -> &mut Joint {
        &mut self.joints[index]
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents[index]
    }

    /// World orientation of a joint, composed by walking parent indices.
    pub fn world_orientation(&self, index: usize) -> UnitQuaternion<f64> {
        match self.parents[index] {
            Some(p) => self.world_orientation(p) * self.joints[index].orientation,
            None => self.joints[index].orientation,
        }
    }

    /// World position of a joint.
    pub fn world_position(&self, index: usize) -> Vector3<f64> {
        match self.parents[index] {
            Some(p) => {
                self.world_position(p) + self.world_orientation(p) * self.joints[index].position
            }
            None => self.joints[index].position,
        }
    }

    /// World pose of every joint in one forward pass.
    pub fn world_poses(&self) -> Vec<(Vector3<f64>, UnitQuaternion<f64>)> {
        let mut poses: Vec<(Vector3<f64>, UnitQuaternion<f64>)> =
            Vec::with_capacity(self.joints.len());
        for (i, joint) in self.joints.iter().enumerate() {
            let pose = match self.parents[i] {
                Some(p) => {
                    let (parent_pos, parent_rot) = poses[p];
                    (
                        parent_pos + parent_rot * joint.position,
                        parent_rot * joint.orientation,
                    )
                }
                None => (joint.position, joint.orientation),
            };
            poses.push(pose);
        }
        poses
    }

    pub fn end_effector_position(&self) -> Vector3<f64> {
        self.world_position(self.joints.len() - 1)
    }

    pub fn end_effector_orientation(&self) -> UnitQuaternion<f64> {
        self.world_orientation(self.joints.len() - 1)
    }

    /// Rotate joint `index` about a world-space axis anchored at the joint.
    ///
    /// The subtree below the joint pivots with it; the joint's own position
    /// does not move.
    pub fn rotate_about_world_axis(&mut self, index: usize, axis: &Unit<Vector3<f64>>, angle: f64) {
        let rotation = UnitQuaternion::from_axis_angle(axis, angle);
        let parent_world = match self.parents[index] {
            Some(p) => self.world_orientation(p),
            None => UnitQuaternion::identity(),
        };
        let local = parent_world.inverse() * rotation * parent_world * self.joints[index].orientation;
        self.joints[index].orientation = local;
    }

    /// Sum of segment lengths below the root: the farthest distance the
    /// end-effector can be from the root joint.
    pub fn max_reach(&self) -> f64 {
        self.joints
            .iter()
            .enumerate()
            .filter(|(i, _)| self.parents[*i].is_some())
            .map(|(_, j)| j.position.norm())
            .sum()
    }

    /// Max and average inter-joint distance in the current configuration.
    pub fn segment_stats(&self) -> SegmentStats {
        if self.len() < 2 {
            return SegmentStats {
                max: 0.0,
                average: 0.0,
            };
        }
        let poses = self.world_poses();
        let mut max = 0.0_f64;
        let mut total = 0.0;
        for i in 1..poses.len() {
            let d = (poses[i].0 - poses[i - 1].0).norm();
            total += d;
            max = max.max(d);
        }
        SegmentStats {
            max,
            average: total / (poses.len() - 1) as f64,
        }
    }
}
