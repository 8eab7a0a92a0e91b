//! Free-function codecs for the math types.
//!
//! The math types are foreign to this crate, so their buffer codecs live
//! here as functions rather than as methods on the types themselves.

use tether_core::{Pose, Quat, Vec3};

use crate::buffer::CommandBuffer;

/// Append three `f32` components.
pub fn encode_vec3(buf: &mut CommandBuffer, v: Vec3) {
    buf.write(v);
}

/// Read three `f32` components.
pub fn decode_vec3(buf: &mut CommandBuffer) -> Vec3 {
    buf.read()
}

/// Append four `f32` components in x, y, z, w order.
pub fn encode_quat(buf: &mut CommandBuffer, q: Quat) {
    buf.write(q);
}

/// Read four `f32` components in x, y, z, w order.
pub fn decode_quat(buf: &mut CommandBuffer) -> Quat {
    buf.read()
}

/// Append position then rotation.
pub fn encode_pose(buf: &mut CommandBuffer, pose: &Pose) {
    encode_vec3(buf, pose.position);
    encode_quat(buf, pose.rotation);
}

/// Read position then rotation.
pub fn decode_pose(buf: &mut CommandBuffer) -> Pose {
    let position = decode_vec3(buf);
    let rotation = decode_quat(buf);
    Pose { position, rotation }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_layout_is_position_then_xyzw() {
        let mut buf = CommandBuffer::new();
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_xyzw(0.0, 0.0, 0.6, 0.8));
        encode_pose(&mut buf, &pose);

        assert_eq!(buf.read::<f32>(), 1.0);
        assert_eq!(buf.read::<f32>(), 2.0);
        assert_eq!(buf.read::<f32>(), 3.0);
        assert_eq!(buf.read::<f32>(), 0.0);
        assert_eq!(buf.read::<f32>(), 0.0);
        assert_eq!(buf.read::<f32>(), 0.6);
        assert_eq!(buf.read::<f32>(), 0.8);

        buf.rewind();
        assert_eq!(decode_pose(&mut buf), pose);
    }
}
