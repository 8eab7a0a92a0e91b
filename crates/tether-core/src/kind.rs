//! Closed classification of tracked objects.

use crate::id::Index;

/// How a rigid body participates in the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MotionType {
    /// Never moves.
    Static = 0,
    /// Moved explicitly by the caller, unaffected by forces.
    Kinematic = 1,
    /// Fully simulated.
    Dynamic = 2,
}

impl MotionType {
    /// Decode a wire tag. Returns `None` for unknown values.
    pub fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Static),
            1 => Some(Self::Kinematic),
            2 => Some(Self::Dynamic),
            _ => None,
        }
    }

    /// Wire tag for this motion type.
    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Partition key used by the object tracker for bulk iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Body with [`MotionType::Dynamic`].
    DynamicBody,
    /// Body with [`MotionType::Kinematic`].
    KinematicBody,
    /// Body with [`MotionType::Static`].
    StaticBody,
    /// Character controller.
    Character,
    /// Standalone collision shape.
    Shape,
    /// Constraint joining two bodies.
    Constraint,
}

impl ObjectKind {
    /// All partitions, in a stable order.
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::DynamicBody,
        ObjectKind::KinematicBody,
        ObjectKind::StaticBody,
        ObjectKind::Character,
        ObjectKind::Shape,
        ObjectKind::Constraint,
    ];
}

/// Kind-specific data for an object tracked on the executor side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackedKind {
    /// Rigid body.
    Body {
        /// Current motion type; changes re-partition the object.
        motion: MotionType,
    },
    /// Character controller.
    Character,
    /// Collision shape registered for reuse by later bodies.
    Shape,
    /// Constraint between two tracked bodies.
    Constraint {
        /// First endpoint.
        body_a: Index,
        /// Second endpoint.
        body_b: Index,
    },
}

impl TrackedKind {
    /// Tracker partition for this kind.
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            Self::Body { motion: MotionType::Dynamic } => ObjectKind::DynamicBody,
            Self::Body { motion: MotionType::Kinematic } => ObjectKind::KinematicBody,
            Self::Body { motion: MotionType::Static } => ObjectKind::StaticBody,
            Self::Character => ObjectKind::Character,
            Self::Shape => ObjectKind::Shape,
            Self::Constraint { .. } => ObjectKind::Constraint,
        }
    }

    /// Endpoints of a constraint, `None` for every other kind.
    pub fn endpoints(&self) -> Option<(Index, Index)> {
        match *self {
            Self::Constraint { body_a, body_b } => Some((body_a, body_b)),
            _ => None,
        }
    }

    /// Whether this kind has a pose worth reporting.
    pub fn has_pose(&self) -> bool {
        matches!(self, Self::Body { .. } | Self::Character)
    }
}
