//! Pose math: position/rotation pairs and shortest-arc blending.

pub use glam::{Quat, Vec3};

/// Angular difference (radians) below which slerp assigns the target
/// directly instead of dividing by a vanishing sine.
pub const ROTATION_EPSILON: f32 = 1.0e-4;

/// World-space position and orientation of one object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// World-space position.
    pub position: Vec3,
    /// World-space orientation (unit quaternion).
    pub rotation: Quat,
}

impl Pose {
    /// Origin with identity rotation.
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Construct a pose.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Pose at `position` with identity rotation.
    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Spherical interpolation along the shorter of the two arcs.
///
/// `to` is negated when its dot product with `from` is negative, so the
/// blend never takes the long way round. Below [`ROTATION_EPSILON`] the
/// target is returned as-is. The result is always normalized.
pub fn slerp_shortest(from: Quat, to: Quat, t: f32) -> Quat {
    let mut target = to;
    let mut dot = from.dot(to);
    if dot < 0.0 {
        target = -target;
        dot = -dot;
    }

    let theta = dot.min(1.0).acos();
    if theta < ROTATION_EPSILON {
        return target.normalize();
    }

    let sin_theta = theta.sin();
    let a = ((1.0 - t) * theta).sin() / sin_theta;
    let b = (t * theta).sin() / sin_theta;
    (from * a + target * b).normalize()
}

/// Blend two poses: linear for position, [`slerp_shortest`] for rotation.
pub fn interpolate_pose(previous: &Pose, current: &Pose, alpha: f32) -> Pose {
    Pose {
        position: previous.position * (1.0 - alpha) + current.position * alpha,
        rotation: slerp_shortest(previous.rotation, current.rotation, alpha),
    }
}
