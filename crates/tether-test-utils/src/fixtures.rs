//! Descriptor fixtures for common scenarios.
//!
//! - [`falling_sphere`]: dynamic unit-ish sphere.
//! - [`anchor`]: static sphere that never moves.
//! - [`ball_joint`]: point constraint between two bodies.
//! - [`chain`]: three bodies joined A-B, B-C.

use tether_backend::{BodyDesc, ConstraintDesc, ConstraintKind, ShapeDesc};
use tether_core::{Index, MotionType, Vec3};

/// Dynamic sphere of radius 0.5 at `position`.
pub fn falling_sphere(index: u32, position: Vec3) -> BodyDesc {
    BodyDesc::new(Index(index), ShapeDesc::Sphere { radius: 0.5 }, position)
}

/// Static sphere of radius 0.5 at `position`.
pub fn anchor(index: u32, position: Vec3) -> BodyDesc {
    falling_sphere(index, position).with_motion(MotionType::Static)
}

/// Ball joint between `a` and `b` with pivots at each body's origin.
pub fn ball_joint(index: u32, a: u32, b: u32) -> ConstraintDesc {
    ConstraintDesc {
        index: Index(index),
        body_a: Index(a),
        body_b: Index(b),
        kind: ConstraintKind::Point {
            pivot_a: Vec3::ZERO,
            pivot_b: Vec3::ZERO,
        },
    }
}

/// Bodies 0, 1, 2 in a row with joints 10 (0-1) and 11 (1-2).
pub fn chain() -> (Vec<BodyDesc>, Vec<ConstraintDesc>) {
    let bodies = (0..3)
        .map(|i| falling_sphere(i, Vec3::new(i as f32, 5.0, 0.0)))
        .collect();
    let joints = vec![ball_joint(10, 0, 1), ball_joint(11, 1, 2)];
    (bodies, joints)
}
