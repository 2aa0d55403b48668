use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A single joint: a rigid offset from its parent plus a local rotation.
///
/// Both fields are expressed in the parent joint's frame. The world pose of a
/// joint is obtained by composing parent transforms; see
/// [`Chain::world_poses`](crate::Chain::world_poses).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Offset from the parent joint, in the parent's frame.
    pub position: Vector3<f64>,
    /// Rotation relative to the parent joint.
    pub orientation: UnitQuaternion<f64>,
}

impl Joint {
    /// Joint with the given parent-relative offset and no rotation.
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

    /// Replace the local rotation.
    pub fn set_orientation(&mut self, orientation: UnitQuaternion<f64>) {
        self.orientation = orientation;
    }

    /// Compose a local rotation onto the current one.
    pub fn rotate(&mut self, rotation: &UnitQuaternion<f64>) {
        self.orientation = rotation * self.orientation;
    }
}
