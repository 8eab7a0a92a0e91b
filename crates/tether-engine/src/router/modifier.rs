//! Modification role: state changes on live objects.

use tether_backend::ModifyCommand;
use tether_buffer::CommandBuffer;
use tether_core::{DispatchError, EngineError, Index, ModifyOp, MotionType, NativeHandle, Pose};
use tether_tracker::MotionState;

use super::{ensure_complete, Outcome, RouteContext};

/// Decode and apply one modification.
///
/// The payload is decoded in full before the target is looked up, so a
/// stale index skips the command without disturbing later frames.
pub fn modify(
    op: ModifyOp,
    buf: &mut CommandBuffer,
    ctx: &mut RouteContext<'_>,
) -> Result<Outcome, DispatchError> {
    let cmd = ModifyCommand::decode(op, buf)?;
    ensure_complete(buf)?;

    if let ModifyCommand::Gravity { gravity } = cmd {
        return Ok(Outcome::from_result(ctx.backend.set_gravity(gravity), None));
    }
    let Some(index) = cmd.target() else {
        return Ok(Outcome::Skipped);
    };
    let Some(native) = ctx.tracker.get(index).map(|o| o.native) else {
        ctx.warnings.warn(
            "modify.stale",
            format_args!("{op:?} addressed {index}, which is not live; skipped"),
        );
        return Ok(Outcome::Skipped);
    };

    Ok(Outcome::from_result(
        apply(&cmd, index, native, ctx),
        Some(index),
    ))
}

fn apply(
    cmd: &ModifyCommand,
    index: Index,
    native: NativeHandle,
    ctx: &mut RouteContext<'_>,
) -> Result<(), EngineError> {
    let backend = &mut *ctx.backend;
    match cmd {
        ModifyCommand::LinearVelocity { velocity, .. } => {
            backend.set_linear_velocity(native, *velocity)
        }
        ModifyCommand::AngularVelocity { velocity, .. } => {
            backend.set_angular_velocity(native, *velocity)
        }
        ModifyCommand::AddForce { force, at, .. } => backend.add_force(native, *force, *at),
        ModifyCommand::AddImpulse { impulse, at, .. } => {
            backend.add_impulse(native, *impulse, *at)
        }
        ModifyCommand::Gravity { gravity } => backend.set_gravity(*gravity),
        ModifyCommand::Enabled { enabled, .. } => backend.set_enabled(native, *enabled),
        ModifyCommand::MotionType { motion, .. } => {
            backend.set_motion_type(native, *motion)?;
            ctx.tracker.set_motion_type(index, *motion);
            let Some(object) = ctx.tracker.get_mut(index) else {
                return Ok(());
            };
            if *motion == MotionType::Static {
                object.motion = None;
            } else if object.motion.is_none() {
                // The type change is already applied; the next fixed step
                // records the real pose.
                let pose = backend.pose(native).unwrap_or_else(|e| {
                    log::warn!("{index} changed to {motion:?} but its pose is unreadable: {e}");
                    Pose::IDENTITY
                });
                object.motion = Some(MotionState::new(pose));
            }
            Ok(())
        }
        ModifyCommand::MoveKinematic { target, .. } => {
            backend.move_kinematic(native, *target, ctx.fixed_step)
        }
        ModifyCommand::SetTransform { pose, wake, .. } => {
            backend.set_transform(native, *pose, *wake)?;
            if let Some(motion) = ctx.tracker.get_mut(index).and_then(|o| o.motion.as_mut()) {
                motion.teleport(*pose);
            }
            Ok(())
        }
        ModifyCommand::CharacterInput { input, .. } => backend.set_character_input(native, input),
        ModifyCommand::ConstraintParams { params, .. } => {
            backend.update_constraint(native, params)
        }
    }
}
