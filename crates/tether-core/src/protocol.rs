//! Operator and opcode tables for the two-level dispatch key.
//!
//! Every frame starts with a `u8` operator naming the subsystem, followed
//! by a `u16` opcode naming the command within it. Unknown values on
//! either level mean the stream has desynchronized.

/// Protocol version exchanged during the executor handshake.
pub const PROTOCOL_VERSION: u16 = 1;

/// First byte of every frame: which subsystem handles it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operator {
    /// Object creation.
    Create = 0,
    /// State changes on live objects.
    Modify = 1,
    /// Ray and shape casts.
    Query = 2,
    /// Object destruction.
    Cleanup = 3,
    /// Executor-to-caller reports in a results buffer.
    Report = 4,
}

impl Operator {
    /// Decode a wire tag.
    pub fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Create),
            1 => Some(Self::Modify),
            2 => Some(Self::Query),
            3 => Some(Self::Cleanup),
            4 => Some(Self::Report),
            _ => None,
        }
    }
}

macro_rules! opcode_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            /// Decode a wire opcode.
            pub fn from_wire(code: u16) -> Option<Self> {
                match code {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Wire opcode for this command.
            pub fn to_wire(self) -> u16 {
                self as u16
            }
        }
    };
}

opcode_enum! {
    /// Opcodes under [`Operator::Create`].
    CreateOp {
        /// Rigid body with an inline or tracked shape.
        Body = 0,
        /// Standalone shape kept for later bodies.
        Shape = 1,
        /// Constraint between two tracked bodies.
        Constraint = 2,
        /// Character controller.
        Character = 3,
    }
}

opcode_enum! {
    /// Opcodes under [`Operator::Modify`].
    ModifyOp {
        /// Set linear velocity.
        LinearVelocity = 0,
        /// Set angular velocity.
        AngularVelocity = 1,
        /// Add a force at the center of mass for the next step.
        AddForce = 2,
        /// Apply an instantaneous impulse.
        AddImpulse = 3,
        /// Set world gravity.
        Gravity = 4,
        /// Enable or disable a body or constraint.
        Enabled = 5,
        /// Change a body's motion type.
        MotionType = 6,
        /// Move a kinematic body towards a target over the next step.
        MoveKinematic = 7,
        /// Teleport to a pose.
        SetTransform = 8,
        /// Set a character's desired velocity and jump flag.
        CharacterInput = 9,
        /// Update a constraint's spring, motor or limits.
        ConstraintParams = 10,
    }
}

opcode_enum! {
    /// Opcodes under [`Operator::Query`].
    QueryOp {
        /// Ray cast.
        Ray = 0,
        /// Shape sweep.
        Shape = 1,
    }
}

opcode_enum! {
    /// Opcodes under [`Operator::Cleanup`].
    CleanupOp {
        /// Destroy an object and every constraint attached to it.
        Destroy = 0,
    }
}

opcode_enum! {
    /// Opcodes under [`Operator::Report`], written by the executor.
    ReportOp {
        /// Interpolated poses for every tracked body and character.
        Transforms = 0,
        /// Hits for one query, tagged with its correlation id.
        QueryHits = 1,
        /// One command failed inside the backend.
        CommandFailed = 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tags_rejected() {
        assert_eq!(Operator::from_wire(9), None);
        assert_eq!(CreateOp::from_wire(4), None);
        assert_eq!(ModifyOp::from_wire(11), None);
        assert_eq!(QueryOp::from_wire(2), None);
        assert_eq!(CleanupOp::from_wire(1), None);
        assert_eq!(ReportOp::from_wire(3), None);
    }

    #[test]
    fn opcode_values_are_stable() {
        assert_eq!(ModifyOp::ConstraintParams.to_wire(), 10);
        assert_eq!(ModifyOp::from_wire(7), Some(ModifyOp::MoveKinematic));
        assert_eq!(Operator::from_wire(Operator::Cleanup as u8), Some(Operator::Cleanup));
    }
}
