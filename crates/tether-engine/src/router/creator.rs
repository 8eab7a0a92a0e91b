//! Creation role: builds backend objects and registers them.

use tether_backend::{
    BodyDesc, CharacterDesc, ConstraintDesc, Payload, ShapeCreate, ShapeRef, ShapeSource,
};
use tether_buffer::CommandBuffer;
use tether_core::{
    CreateOp, DispatchError, Index, MotionType, NativeHandle, Pose, TrackedKind,
};
use tether_tracker::{MotionState, TrackedObject};

use super::{ensure_complete, Outcome, RouteContext};
use crate::report::FailureKind;

/// Decode and apply one creation command.
pub fn create(
    op: CreateOp,
    buf: &mut CommandBuffer,
    ctx: &mut RouteContext<'_>,
) -> Result<Outcome, DispatchError> {
    let outcome = match op {
        CreateOp::Body => {
            let desc = BodyDesc::decode(buf)?;
            ensure_complete(buf)?;
            create_body(&desc, ctx)
        }
        CreateOp::Shape => {
            let desc = ShapeCreate::decode(buf)?;
            ensure_complete(buf)?;
            create_shape(&desc, ctx)
        }
        CreateOp::Constraint => {
            let desc = ConstraintDesc::decode(buf)?;
            ensure_complete(buf)?;
            create_constraint(&desc, ctx)
        }
        CreateOp::Character => {
            let desc = CharacterDesc::decode(buf)?;
            ensure_complete(buf)?;
            create_character(&desc, ctx)
        }
    };
    Ok(outcome)
}

fn in_use(index: Index) -> Outcome {
    log::debug!("create on live index {index} refused");
    Outcome::Failed {
        kind: FailureKind::IndexInUse,
        target: Some(index),
    }
}

fn stale(ctx: &mut RouteContext<'_>, what: &str, missing: Index, target: Index) -> Outcome {
    ctx.warnings.warn(
        "create.stale",
        format_args!("creating {target}: {what} {missing} is not live"),
    );
    Outcome::Failed {
        kind: FailureKind::StaleIndex,
        target: Some(target),
    }
}

fn pose_history(pose: Pose, interpolate: bool) -> MotionState {
    if interpolate {
        MotionState::new(pose)
    } else {
        MotionState::without_blending(pose)
    }
}

/// Track a freshly built object, releasing it again if tracking fails.
fn register(ctx: &mut RouteContext<'_>, object: TrackedObject) -> Outcome {
    let (index, native) = (object.index, object.native);
    match ctx.tracker.add(object) {
        Ok(()) => {
            log::trace!("created {index} as {native}");
            Outcome::Applied
        }
        Err(e) => {
            log::debug!("tracking {index} failed: {e}");
            if let Err(e) = ctx.backend.destroy(native) {
                log::warn!("releasing untracked {native} failed: {e}");
            }
            Outcome::Failed {
                kind: FailureKind::Rejected,
                target: Some(index),
            }
        }
    }
}

fn body_native(ctx: &RouteContext<'_>, index: Index) -> Option<NativeHandle> {
    ctx.tracker
        .get(index)
        .filter(|o| matches!(o.kind, TrackedKind::Body { .. }))
        .map(|o| o.native)
}

fn create_body(desc: &BodyDesc, ctx: &mut RouteContext<'_>) -> Outcome {
    if ctx.tracker.contains(desc.index) {
        return in_use(desc.index);
    }
    let result = match &desc.shape {
        ShapeSource::Inline(shape) => ctx.backend.create_body(desc, ShapeRef::Inline(shape)),
        ShapeSource::Tracked(shape) => {
            let native = ctx
                .tracker
                .get(*shape)
                .filter(|o| o.kind == TrackedKind::Shape)
                .map(|o| o.native);
            match native {
                Some(native) => ctx.backend.create_body(desc, ShapeRef::Native(native)),
                None => return stale(ctx, "shape", *shape, desc.index),
            }
        }
    };
    let native = match result {
        Ok(native) => native,
        Err(e) => return Outcome::failed(&e, Some(desc.index)),
    };

    let mut object = TrackedObject::new(
        desc.index,
        native,
        TrackedKind::Body {
            motion: desc.motion,
        },
    );
    if desc.motion != MotionType::Static {
        object = object.with_motion(pose_history(desc.pose, desc.interpolate && ctx.interpolate));
    }
    register(ctx, object)
}

fn create_shape(desc: &ShapeCreate, ctx: &mut RouteContext<'_>) -> Outcome {
    if ctx.tracker.contains(desc.index) {
        return in_use(desc.index);
    }
    match ctx.backend.create_shape(&desc.shape) {
        Ok(native) => register(ctx, TrackedObject::new(desc.index, native, TrackedKind::Shape)),
        Err(e) => Outcome::failed(&e, Some(desc.index)),
    }
}

fn create_constraint(desc: &ConstraintDesc, ctx: &mut RouteContext<'_>) -> Outcome {
    if ctx.tracker.contains(desc.index) {
        return in_use(desc.index);
    }
    let Some(a) = body_native(ctx, desc.body_a) else {
        return stale(ctx, "body", desc.body_a, desc.index);
    };
    let Some(b) = body_native(ctx, desc.body_b) else {
        return stale(ctx, "body", desc.body_b, desc.index);
    };
    match ctx.backend.create_constraint(desc, a, b) {
        Ok(native) => {
            let kind = TrackedKind::Constraint {
                body_a: desc.body_a,
                body_b: desc.body_b,
            };
            register(ctx, TrackedObject::new(desc.index, native, kind))
        }
        Err(e) => Outcome::failed(&e, Some(desc.index)),
    }
}

fn create_character(desc: &CharacterDesc, ctx: &mut RouteContext<'_>) -> Outcome {
    if ctx.tracker.contains(desc.index) {
        return in_use(desc.index);
    }
    match ctx.backend.create_character(desc) {
        Ok(native) => {
            let object = TrackedObject::new(desc.index, native, TrackedKind::Character)
                .with_motion(pose_history(desc.pose, desc.interpolate && ctx.interpolate));
            register(ctx, object)
        }
        Err(e) => Outcome::failed(&e, Some(desc.index)),
    }
}
