//! Character controller payloads.

use tether_buffer::codec::{decode_pose, encode_pose};
use tether_buffer::CommandBuffer;
use tether_core::{CreateOp, DispatchError, Index, Operator, Pose, Vec3};

use crate::payload::{Command, Payload};
use crate::shape::ShapeDesc;

/// Everything needed to create one character controller.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterDesc {
    /// Caller-assigned handle.
    pub index: Index,
    /// Collision shape, usually a capsule.
    pub shape: ShapeDesc,
    /// Initial pose.
    pub pose: Pose,
    /// World up direction.
    pub up: Vec3,
    /// Steepest walkable slope in radians.
    pub max_slope: f32,
    /// Tallest step climbed without jumping.
    pub step_height: f32,
    /// Mass used when pushing bodies.
    pub mass: f32,
    /// Collision layer bits.
    pub layers: u32,
    /// Report interpolated poses for this character.
    pub interpolate: bool,
}

impl CharacterDesc {
    /// Upright capsule character at `position`.
    pub fn capsule(index: Index, position: Vec3, half_height: f32, radius: f32) -> Self {
        Self {
            index,
            shape: ShapeDesc::Capsule {
                half_height,
                radius,
            },
            pose: Pose::from_position(position),
            up: Vec3::Y,
            max_slope: 50f32.to_radians(),
            step_height: 0.3,
            mass: 70.0,
            layers: 1,
            interpolate: true,
        }
    }
}

impl Payload for CharacterDesc {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.index);
        self.shape.encode(buf);
        encode_pose(buf, &self.pose);
        buf.write(self.up);
        buf.write(self.max_slope);
        buf.write(self.step_height);
        buf.write(self.mass);
        buf.write(self.layers);
        buf.write(self.interpolate);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        let index = buf.read();
        let shape = ShapeDesc::decode(buf)?;
        Ok(Self {
            index,
            shape,
            pose: decode_pose(buf),
            up: buf.read(),
            max_slope: buf.read(),
            step_height: buf.read(),
            mass: buf.read(),
            layers: buf.read(),
            interpolate: buf.read(),
        })
    }
}

impl Command for CharacterDesc {
    const OPERATOR: Operator = Operator::Create;

    fn opcode(&self) -> u16 {
        CreateOp::Character.to_wire()
    }

    fn encode_payload(&self, buf: &mut CommandBuffer) {
        self.encode(buf);
    }
}

/// Per-step movement request for a character.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CharacterInput {
    /// Desired horizontal velocity.
    pub velocity: Vec3,
    /// Upward launch speed, if jumping this step.
    pub jump: Option<f32>,
}

impl Payload for CharacterInput {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.velocity);
        buf.write_optional(self.jump);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        Ok(Self {
            velocity: buf.read(),
            jump: buf.read_optional(),
        })
    }
}
