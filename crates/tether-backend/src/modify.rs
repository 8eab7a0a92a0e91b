//! State changes on live objects.

use tether_buffer::codec::{decode_pose, encode_pose};
use tether_buffer::CommandBuffer;
use tether_core::{DispatchError, Index, ModifyOp, MotionType, Operator, Pose, Vec3};

use crate::body::decode_motion;
use crate::character::CharacterInput;
use crate::constraint::ConstraintParams;
use crate::payload::{Command, Payload};

/// One state change. Every variant except [`Gravity`](Self::Gravity)
/// addresses a tracked object.
#[derive(Clone, Debug, PartialEq)]
pub enum ModifyCommand {
    /// Set linear velocity.
    LinearVelocity {
        /// Target body.
        index: Index,
        /// New velocity.
        velocity: Vec3,
    },
    /// Set angular velocity.
    AngularVelocity {
        /// Target body.
        index: Index,
        /// New velocity.
        velocity: Vec3,
    },
    /// Accumulate a force for the next step.
    AddForce {
        /// Target body.
        index: Index,
        /// World-space force.
        force: Vec3,
        /// World-space application point; `None` is the center of mass.
        at: Option<Vec3>,
    },
    /// Apply an instantaneous impulse.
    AddImpulse {
        /// Target body.
        index: Index,
        /// World-space impulse.
        impulse: Vec3,
        /// World-space application point; `None` is the center of mass.
        at: Option<Vec3>,
    },
    /// Set world gravity.
    Gravity {
        /// New gravity vector.
        gravity: Vec3,
    },
    /// Enable or disable a body or constraint.
    Enabled {
        /// Target object.
        index: Index,
        /// New state.
        enabled: bool,
    },
    /// Change a body's motion type.
    MotionType {
        /// Target body.
        index: Index,
        /// New motion type.
        motion: MotionType,
    },
    /// Drive a kinematic body to `target` over the next fixed step.
    MoveKinematic {
        /// Target body.
        index: Index,
        /// Pose to reach.
        target: Pose,
    },
    /// Teleport an object.
    SetTransform {
        /// Target object.
        index: Index,
        /// New pose.
        pose: Pose,
        /// Wake the body if it was asleep.
        wake: bool,
    },
    /// Set a character's movement input.
    CharacterInput {
        /// Target character.
        index: Index,
        /// Movement request.
        input: CharacterInput,
    },
    /// Update a constraint's spring, limits or motor.
    ConstraintParams {
        /// Target constraint.
        index: Index,
        /// Fields to change.
        params: ConstraintParams,
    },
}

impl ModifyCommand {
    /// Opcode for this variant.
    pub fn op(&self) -> ModifyOp {
        match self {
            Self::LinearVelocity { .. } => ModifyOp::LinearVelocity,
            Self::AngularVelocity { .. } => ModifyOp::AngularVelocity,
            Self::AddForce { .. } => ModifyOp::AddForce,
            Self::AddImpulse { .. } => ModifyOp::AddImpulse,
            Self::Gravity { .. } => ModifyOp::Gravity,
            Self::Enabled { .. } => ModifyOp::Enabled,
            Self::MotionType { .. } => ModifyOp::MotionType,
            Self::MoveKinematic { .. } => ModifyOp::MoveKinematic,
            Self::SetTransform { .. } => ModifyOp::SetTransform,
            Self::CharacterInput { .. } => ModifyOp::CharacterInput,
            Self::ConstraintParams { .. } => ModifyOp::ConstraintParams,
        }
    }

    /// Addressed object, `None` for world-level changes.
    pub fn target(&self) -> Option<Index> {
        match self {
            Self::Gravity { .. } => None,
            Self::LinearVelocity { index, .. }
            | Self::AngularVelocity { index, .. }
            | Self::AddForce { index, .. }
            | Self::AddImpulse { index, .. }
            | Self::Enabled { index, .. }
            | Self::MotionType { index, .. }
            | Self::MoveKinematic { index, .. }
            | Self::SetTransform { index, .. }
            | Self::CharacterInput { index, .. }
            | Self::ConstraintParams { index, .. } => Some(*index),
        }
    }

    /// Read the payload for `op`. The whole payload is consumed before
    /// returning, so a stale target never shifts later frames.
    pub fn decode(op: ModifyOp, buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        let cmd = match op {
            ModifyOp::Gravity => Self::Gravity {
                gravity: buf.read(),
            },
            ModifyOp::LinearVelocity => Self::LinearVelocity {
                index: buf.read(),
                velocity: buf.read(),
            },
            ModifyOp::AngularVelocity => Self::AngularVelocity {
                index: buf.read(),
                velocity: buf.read(),
            },
            ModifyOp::AddForce => Self::AddForce {
                index: buf.read(),
                force: buf.read(),
                at: buf.read_optional(),
            },
            ModifyOp::AddImpulse => Self::AddImpulse {
                index: buf.read(),
                impulse: buf.read(),
                at: buf.read_optional(),
            },
            ModifyOp::Enabled => Self::Enabled {
                index: buf.read(),
                enabled: buf.read(),
            },
            ModifyOp::MotionType => Self::MotionType {
                index: buf.read(),
                motion: decode_motion(buf)?,
            },
            ModifyOp::MoveKinematic => Self::MoveKinematic {
                index: buf.read(),
                target: decode_pose(buf),
            },
            ModifyOp::SetTransform => Self::SetTransform {
                index: buf.read(),
                pose: decode_pose(buf),
                wake: buf.read(),
            },
            ModifyOp::CharacterInput => Self::CharacterInput {
                index: buf.read(),
                input: CharacterInput::decode(buf)?,
            },
            ModifyOp::ConstraintParams => Self::ConstraintParams {
                index: buf.read(),
                params: ConstraintParams::decode(buf)?,
            },
        };
        Ok(cmd)
    }
}

impl Command for ModifyCommand {
    const OPERATOR: Operator = Operator::Modify;

    fn opcode(&self) -> u16 {
        self.op().to_wire()
    }

    fn encode_payload(&self, buf: &mut CommandBuffer) {
        match self {
            Self::Gravity { gravity } => buf.write(*gravity),
            Self::LinearVelocity { index, velocity }
            | Self::AngularVelocity { index, velocity } => {
                buf.write(*index);
                buf.write(*velocity);
            }
            Self::AddForce {
                index,
                force: v,
                at,
            }
            | Self::AddImpulse {
                index,
                impulse: v,
                at,
            } => {
                buf.write(*index);
                buf.write(*v);
                buf.write_optional(*at);
            }
            Self::Enabled { index, enabled } => {
                buf.write(*index);
                buf.write(*enabled);
            }
            Self::MotionType { index, motion } => {
                buf.write(*index);
                buf.write(motion.to_wire());
            }
            Self::MoveKinematic { index, target } => {
                buf.write(*index);
                encode_pose(buf, target);
            }
            Self::SetTransform { index, pose, wake } => {
                buf.write(*index);
                encode_pose(buf, pose);
                buf.write(*wake);
            }
            Self::CharacterInput { index, input } => {
                buf.write(*index);
                input.encode(buf);
            }
            Self::ConstraintParams { index, params } => {
                buf.write(*index);
                params.encode(buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Limits;

    #[test]
    fn each_variant_consumes_its_payload() {
        let cmds = vec![
            ModifyCommand::Gravity {
                gravity: Vec3::new(0.0, -3.7, 0.0),
            },
            ModifyCommand::AddImpulse {
                index: Index(2),
                impulse: Vec3::Y,
                at: Some(Vec3::X),
            },
            ModifyCommand::MotionType {
                index: Index(2),
                motion: MotionType::Kinematic,
            },
            ModifyCommand::SetTransform {
                index: Index(3),
                pose: Pose::from_position(Vec3::Z),
                wake: true,
            },
            ModifyCommand::CharacterInput {
                index: Index(5),
                input: CharacterInput {
                    velocity: Vec3::X,
                    jump: Some(4.0),
                },
            },
            ModifyCommand::ConstraintParams {
                index: Index(9),
                params: ConstraintParams {
                    limits: Some(Limits { min: -1.0, max: 1.0 }),
                    ..ConstraintParams::default()
                },
            },
        ];
        let mut buf = CommandBuffer::new();
        for c in &cmds {
            c.write_to(&mut buf);
        }
        assert_eq!(buf.commands_count() as usize, cmds.len());

        for expected in &cmds {
            assert_eq!(buf.read_operator(), Operator::Modify as u8);
            let op = ModifyOp::from_wire(buf.read_command()).unwrap();
            assert_eq!(&ModifyCommand::decode(op, &mut buf).unwrap(), expected);
        }
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn gravity_has_no_target() {
        let g = ModifyCommand::Gravity { gravity: Vec3::ZERO };
        assert_eq!(g.target(), None);
        let e = ModifyCommand::Enabled {
            index: Index(1),
            enabled: false,
        };
        assert_eq!(e.target(), Some(Index(1)));
    }
}
