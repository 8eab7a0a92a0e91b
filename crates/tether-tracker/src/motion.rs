//! Per-object pose history for render interpolation.

use tether_core::math::interpolate_pose;
use tether_core::Pose;

/// Previous, current, and blended pose of one tracked object.
///
/// `previous` and `current` bracket the last fixed step; `visible` is
/// what gets reported to the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionState {
    /// Pose before the last fixed step.
    pub previous: Pose,
    /// Pose after the last fixed step.
    pub current: Pose,
    /// Pose reported to the caller.
    pub visible: Pose,
    /// Whether [`interpolate`](Self::interpolate) blends or snaps.
    pub blend: bool,
}

impl MotionState {
    /// State at rest at `pose`.
    pub fn new(pose: Pose) -> Self {
        Self {
            previous: pose,
            current: pose,
            visible: pose,
            blend: true,
        }
    }

    /// State that always reports the latest step's pose.
    pub fn without_blending(pose: Pose) -> Self {
        Self {
            blend: false,
            ..Self::new(pose)
        }
    }

    /// Start a fixed step: the current pose becomes the previous one.
    pub fn begin_step(&mut self) {
        self.previous = self.current;
    }

    /// Store the pose produced by a fixed step.
    pub fn record(&mut self, pose: Pose) {
        self.current = pose;
    }

    /// Blend previous and current by `alpha` into the visible pose.
    pub fn interpolate(&mut self, alpha: f32) {
        if !self.blend {
            return self.snap();
        }
        self.visible = interpolate_pose(&self.previous, &self.current, alpha);
    }

    /// Show the current pose without blending.
    pub fn snap(&mut self) {
        self.visible = self.current;
    }

    /// Jump to `pose` with no history to blend from.
    pub fn teleport(&mut self, pose: Pose) {
        *self = Self {
            blend: self.blend,
            ..Self::new(pose)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::Vec3;

    #[test]
    fn step_then_blend() {
        let mut m = MotionState::new(Pose::from_position(Vec3::ZERO));
        m.begin_step();
        m.record(Pose::from_position(Vec3::new(0.0, -2.0, 0.0)));
        m.interpolate(0.5);
        assert!(m.visible.position.abs_diff_eq(Vec3::new(0.0, -1.0, 0.0), 1e-6));

        m.snap();
        assert_eq!(m.visible, m.current);
    }

    #[test]
    fn teleport_drops_history() {
        let mut m = MotionState::new(Pose::IDENTITY);
        m.record(Pose::from_position(Vec3::X));
        m.teleport(Pose::from_position(Vec3::Y));
        m.interpolate(0.3);
        assert_eq!(m.visible.position, Vec3::Y);
    }

    #[test]
    fn unblended_state_snaps() {
        let mut m = MotionState::without_blending(Pose::IDENTITY);
        m.begin_step();
        m.record(Pose::from_position(Vec3::X));
        m.interpolate(0.0);
        assert_eq!(m.visible.position, Vec3::X);
    }
}
