//! Constraint creation and update payloads.

use tether_buffer::CommandBuffer;
use tether_core::{CreateOp, DispatchError, Index, Operator, Vec3};

use crate::payload::{decode_opt, encode_opt, Command, Payload};

/// Soft spring response.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spring {
    /// Oscillation frequency in Hz.
    pub frequency: f32,
    /// Damping ratio; 1 is critical.
    pub damping: f32,
}

/// Allowed range of the constrained degree of freedom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Limits {
    /// Lower bound (radians or metres).
    pub min: f32,
    /// Upper bound (radians or metres).
    pub max: f32,
}

/// Velocity motor driving the constrained degree of freedom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motor {
    /// Target velocity.
    pub target_velocity: f32,
    /// Maximum force or torque the motor may apply.
    pub max_force: f32,
}

impl Payload for Spring {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.frequency);
        buf.write(self.damping);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        Ok(Self {
            frequency: buf.read(),
            damping: buf.read(),
        })
    }
}

impl Payload for Limits {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.min);
        buf.write(self.max);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        Ok(Self {
            min: buf.read(),
            max: buf.read(),
        })
    }
}

impl Payload for Motor {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.target_velocity);
        buf.write(self.max_force);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        Ok(Self {
            target_velocity: buf.read(),
            max_force: buf.read(),
        })
    }
}

/// Kind-specific constraint geometry.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintKind {
    /// Locks all relative motion.
    Fixed,
    /// Ball joint: pivots coincide.
    Point {
        /// Pivot in body A's local space.
        pivot_a: Vec3,
        /// Pivot in body B's local space.
        pivot_b: Vec3,
    },
    /// Keeps pivots within a distance range.
    Distance {
        /// Pivot in body A's local space.
        pivot_a: Vec3,
        /// Pivot in body B's local space.
        pivot_b: Vec3,
        /// Allowed distance range.
        range: Limits,
        /// Soft response at the range bounds.
        spring: Option<Spring>,
    },
    /// Rotation about one axis.
    Hinge {
        /// Pivot in body A's local space.
        pivot_a: Vec3,
        /// Pivot in body B's local space.
        pivot_b: Vec3,
        /// Hinge axis in body A's local space.
        axis: Vec3,
        /// Angle limits.
        limits: Option<Limits>,
        /// Angular motor.
        motor: Option<Motor>,
    },
    /// Translation along one axis.
    Slider {
        /// Slide axis in body A's local space.
        axis: Vec3,
        /// Position limits.
        limits: Option<Limits>,
        /// Linear motor.
        motor: Option<Motor>,
    },
}

const FIXED: u8 = 0;
const POINT: u8 = 1;
const DISTANCE: u8 = 2;
const HINGE: u8 = 3;
const SLIDER: u8 = 4;

impl Payload for ConstraintKind {
    fn encode(&self, buf: &mut CommandBuffer) {
        match self {
            Self::Fixed => buf.write(FIXED),
            Self::Point { pivot_a, pivot_b } => {
                buf.write(POINT);
                buf.write(*pivot_a);
                buf.write(*pivot_b);
            }
            Self::Distance {
                pivot_a,
                pivot_b,
                range,
                spring,
            } => {
                buf.write(DISTANCE);
                buf.write(*pivot_a);
                buf.write(*pivot_b);
                range.encode(buf);
                encode_opt(buf, spring);
            }
            Self::Hinge {
                pivot_a,
                pivot_b,
                axis,
                limits,
                motor,
            } => {
                buf.write(HINGE);
                buf.write(*pivot_a);
                buf.write(*pivot_b);
                buf.write(*axis);
                encode_opt(buf, limits);
                encode_opt(buf, motor);
            }
            Self::Slider {
                axis,
                limits,
                motor,
            } => {
                buf.write(SLIDER);
                buf.write(*axis);
                encode_opt(buf, limits);
                encode_opt(buf, motor);
            }
        }
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        let kind = match buf.read::<u8>() {
            FIXED => Self::Fixed,
            POINT => Self::Point {
                pivot_a: buf.read(),
                pivot_b: buf.read(),
            },
            DISTANCE => Self::Distance {
                pivot_a: buf.read(),
                pivot_b: buf.read(),
                range: Limits::decode(buf)?,
                spring: decode_opt(buf)?,
            },
            HINGE => Self::Hinge {
                pivot_a: buf.read(),
                pivot_b: buf.read(),
                axis: buf.read(),
                limits: decode_opt(buf)?,
                motor: decode_opt(buf)?,
            },
            SLIDER => Self::Slider {
                axis: buf.read(),
                limits: decode_opt(buf)?,
                motor: decode_opt(buf)?,
            },
            tag => {
                return Err(DispatchError::UnknownVariant {
                    what: "constraint",
                    tag,
                })
            }
        };
        Ok(kind)
    }
}

/// Everything needed to create one constraint.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintDesc {
    /// Caller-assigned handle.
    pub index: Index,
    /// First endpoint.
    pub body_a: Index,
    /// Second endpoint.
    pub body_b: Index,
    /// Geometry and parameters.
    pub kind: ConstraintKind,
}

impl Payload for ConstraintDesc {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.index);
        buf.write(self.body_a);
        buf.write(self.body_b);
        self.kind.encode(buf);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        Ok(Self {
            index: buf.read(),
            body_a: buf.read(),
            body_b: buf.read(),
            kind: ConstraintKind::decode(buf)?,
        })
    }
}

impl Command for ConstraintDesc {
    const OPERATOR: Operator = Operator::Create;

    fn opcode(&self) -> u16 {
        CreateOp::Constraint.to_wire()
    }

    fn encode_payload(&self, buf: &mut CommandBuffer) {
        self.encode(buf);
    }
}

/// Runtime update to a live constraint. Absent fields are unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConstraintParams {
    /// New spring settings.
    pub spring: Option<Spring>,
    /// New limits.
    pub limits: Option<Limits>,
    /// New motor settings.
    pub motor: Option<Motor>,
}

impl Payload for ConstraintParams {
    fn encode(&self, buf: &mut CommandBuffer) {
        encode_opt(buf, &self.spring);
        encode_opt(buf, &self.limits);
        encode_opt(buf, &self.motor);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        Ok(Self {
            spring: decode_opt(buf)?,
            limits: decode_opt(buf)?,
            motor: decode_opt(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hinge_with_partial_options() {
        let desc = ConstraintDesc {
            index: Index(4),
            body_a: Index(1),
            body_b: Index(2),
            kind: ConstraintKind::Hinge {
                pivot_a: Vec3::X,
                pivot_b: -Vec3::X,
                axis: Vec3::Y,
                limits: None,
                motor: Some(Motor {
                    target_velocity: 2.0,
                    max_force: 50.0,
                }),
            },
        };
        let mut buf = CommandBuffer::new();
        desc.encode(&mut buf);
        assert_eq!(ConstraintDesc::decode(&mut buf).unwrap(), desc);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn bad_presence_flag_is_desync() {
        let mut buf = CommandBuffer::new();
        buf.write(7u8);
        assert_eq!(
            ConstraintParams::decode(&mut buf),
            Err(DispatchError::UnknownVariant {
                what: "presence flag",
                tag: 7
            })
        );
    }
}
