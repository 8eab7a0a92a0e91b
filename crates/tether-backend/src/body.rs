//! Rigid body creation payload.

use tether_buffer::codec::{decode_pose, encode_pose};
use tether_buffer::CommandBuffer;
use tether_core::{CreateOp, DispatchError, Index, MotionType, Operator, Pose, Vec3};

use crate::payload::{Command, Payload};
use crate::shape::ShapeDesc;

/// Where a body gets its collision shape.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeSource {
    /// Shape described in the same frame.
    Inline(ShapeDesc),
    /// Shape created earlier with its own index.
    Tracked(Index),
}

impl Payload for ShapeSource {
    fn encode(&self, buf: &mut CommandBuffer) {
        match self {
            Self::Inline(shape) => {
                buf.write(0u8);
                shape.encode(buf);
            }
            Self::Tracked(index) => {
                buf.write(1u8);
                buf.write(*index);
            }
        }
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        match buf.read::<u8>() {
            0 => ShapeDesc::decode(buf).map(Self::Inline),
            1 => Ok(Self::Tracked(buf.read())),
            tag => Err(DispatchError::UnknownVariant {
                what: "shape source",
                tag,
            }),
        }
    }
}

/// Everything needed to create one rigid body.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyDesc {
    /// Caller-assigned handle.
    pub index: Index,
    /// Collision shape.
    pub shape: ShapeSource,
    /// Initial pose.
    pub pose: Pose,
    /// Static, kinematic or dynamic.
    pub motion: MotionType,
    /// Mass override; `None` derives mass from the shape.
    pub mass: Option<f32>,
    /// Coulomb friction coefficient.
    pub friction: f32,
    /// Bounciness in `[0, 1]`.
    pub restitution: f32,
    /// Linear velocity damping per second.
    pub linear_damping: f32,
    /// Angular velocity damping per second.
    pub angular_damping: f32,
    /// Multiplier on world gravity.
    pub gravity_factor: f32,
    /// Initial linear velocity.
    pub linear_velocity: Option<Vec3>,
    /// Initial angular velocity.
    pub angular_velocity: Option<Vec3>,
    /// Collision layer bits; queries filter against these.
    pub layers: u32,
    /// Detects overlaps without producing contact response.
    pub sensor: bool,
    /// Report interpolated poses for this body.
    pub interpolate: bool,
}

impl BodyDesc {
    /// Dynamic body at `position` with default material.
    pub fn new(index: Index, shape: ShapeDesc, position: Vec3) -> Self {
        Self {
            index,
            shape: ShapeSource::Inline(shape),
            pose: Pose::from_position(position),
            motion: MotionType::Dynamic,
            mass: None,
            friction: 0.2,
            restitution: 0.0,
            linear_damping: 0.05,
            angular_damping: 0.05,
            gravity_factor: 1.0,
            linear_velocity: None,
            angular_velocity: None,
            layers: 1,
            sensor: false,
            interpolate: true,
        }
    }

    /// Set the motion type.
    pub fn with_motion(mut self, motion: MotionType) -> Self {
        self.motion = motion;
        self
    }

    /// Set the initial pose.
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }
}

impl Payload for BodyDesc {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.index);
        self.shape.encode(buf);
        encode_pose(buf, &self.pose);
        buf.write(self.motion.to_wire());
        buf.write_optional(self.mass);
        buf.write(self.friction);
        buf.write(self.restitution);
        buf.write(self.linear_damping);
        buf.write(self.angular_damping);
        buf.write(self.gravity_factor);
        buf.write_optional(self.linear_velocity);
        buf.write_optional(self.angular_velocity);
        buf.write(self.layers);
        buf.write(self.sensor);
        buf.write(self.interpolate);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        let index = buf.read();
        let shape = ShapeSource::decode(buf)?;
        let pose = decode_pose(buf);
        let motion = decode_motion(buf)?;
        Ok(Self {
            index,
            shape,
            pose,
            motion,
            mass: buf.read_optional(),
            friction: buf.read(),
            restitution: buf.read(),
            linear_damping: buf.read(),
            angular_damping: buf.read(),
            gravity_factor: buf.read(),
            linear_velocity: buf.read_optional(),
            angular_velocity: buf.read_optional(),
            layers: buf.read(),
            sensor: buf.read(),
            interpolate: buf.read(),
        })
    }
}

impl Command for BodyDesc {
    const OPERATOR: Operator = Operator::Create;

    fn opcode(&self) -> u16 {
        CreateOp::Body.to_wire()
    }

    fn encode_payload(&self, buf: &mut CommandBuffer) {
        self.encode(buf);
    }
}

/// Read a motion type tag; unknown tags desynchronize the stream.
pub(crate) fn decode_motion(buf: &mut CommandBuffer) -> Result<MotionType, DispatchError> {
    let tag = buf.read::<u8>();
    MotionType::from_wire(tag).ok_or(DispatchError::UnknownVariant {
        what: "motion type",
        tag,
    })
}
