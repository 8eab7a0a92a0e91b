//! The caller-side object a proxy keeps in sync with the simulation.

use tether_core::{Pose, Quat, Vec3};

/// Anything with a position and rotation the proxy can read and write.
///
/// The proxy reads the node once when the body is created and writes it
/// after every step that reports a transform for it.
pub trait SceneNode {
    /// World position.
    fn position(&self) -> Vec3;
    /// Overwrite the world position.
    fn set_position(&mut self, position: Vec3);
    /// World rotation.
    fn rotation(&self) -> Quat;
    /// Overwrite the world rotation.
    fn set_rotation(&mut self, rotation: Quat);

    /// Both halves as one pose.
    fn pose(&self) -> Pose {
        Pose::new(self.position(), self.rotation())
    }

    /// Apply a reported pose.
    fn apply_pose(&mut self, pose: &Pose) {
        self.set_position(pose.position);
        self.set_rotation(pose.rotation);
    }
}

impl SceneNode for Pose {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }
}
