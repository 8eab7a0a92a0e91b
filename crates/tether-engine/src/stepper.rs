//! Fixed-step accumulator with pose interpolation.
//!
//! Caller frames arrive with arbitrary `dt`. The stepper banks that time
//! and spends it in whole fixed steps; whatever is left over becomes the
//! interpolation factor `alpha = leftover / fixed_step` used to blend each
//! object's pose between the last two fixed steps.

use tether_backend::PhysicsBackend;
use tether_core::{EngineError, ObjectKind, WarnOnce};
use tether_tracker::Tracker;

use crate::hooks::{CallbackCategory, HookContext, Hooks};

/// What one call to [`Stepper::advance`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Advance {
    /// Fixed steps taken.
    pub sub_steps: u32,
    /// Blend factor applied to visible poses, in `[0, 1)`.
    pub alpha: f32,
    /// Objects whose pose could not be read.
    pub pose_failures: u32,
    /// Seconds discarded by the sub-step cap.
    pub dropped_time: f32,
}

/// Fixed-step time accumulator.
#[derive(Clone, Debug)]
pub struct Stepper {
    fixed_step: f32,
    max_sub_steps: Option<u32>,
    interpolate: bool,
    accumulator: f32,
    total_steps: u64,
}

impl Stepper {
    /// Create a stepper with an empty accumulator.
    ///
    /// `fixed_step` must be finite and positive; see
    /// [`ExecutorConfig::validate`](crate::ExecutorConfig::validate).
    pub fn new(fixed_step: f32, max_sub_steps: Option<u32>, interpolate: bool) -> Self {
        Self {
            fixed_step,
            max_sub_steps,
            interpolate,
            accumulator: 0.0,
            total_steps: 0,
        }
    }

    /// Seconds per fixed step.
    pub fn fixed_step(&self) -> f32 {
        self.fixed_step
    }

    /// Banked time not yet spent on a fixed step.
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Fixed steps taken since creation.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Bank `dt` seconds and return how many whole fixed steps to take,
    /// applying the sub-step cap. The second value is the time dropped.
    fn bank(&mut self, dt: f32, warnings: &mut WarnOnce) -> (u32, f32) {
        if dt.is_finite() && dt > 0.0 {
            self.accumulator += dt;
        } else if dt != 0.0 {
            warnings.warn(
                "stepper.dt",
                format_args!("ignoring invalid frame time {dt}"),
            );
        }

        let whole = (self.accumulator / self.fixed_step).floor();
        let mut steps = whole.min(u32::MAX as f32) as u32;
        let mut dropped = 0.0;
        if let Some(max) = self.max_sub_steps {
            if steps > max {
                dropped = (steps - max) as f32 * self.fixed_step;
                self.accumulator -= dropped;
                steps = max;
                warnings.warn(
                    "stepper.sub_steps",
                    format_args!("frame needs {whole} fixed steps, capped at {max}"),
                );
            }
        }
        (steps, dropped)
    }

    /// Spend banked time on fixed steps and refresh every visible pose.
    ///
    /// Within each fixed step: pre-step hooks, previous-pose snapshot,
    /// character updates, the backend step, post-step hooks, then a pose
    /// read per tracked object. A failed backend step aborts the call; a
    /// failed pose read or character update only affects that object.
    pub(crate) fn advance(
        &mut self,
        dt: f32,
        backend: &mut dyn PhysicsBackend,
        tracker: &mut Tracker,
        hooks: &mut Hooks,
        warnings: &mut WarnOnce,
    ) -> Result<Advance, EngineError> {
        let (steps, dropped_time) = self.bank(dt, warnings);
        let mut out = Advance {
            dropped_time,
            ..Advance::default()
        };

        for sub_step in 0..steps {
            let mut ctx = HookContext {
                backend: &mut *backend,
                tracker: &*tracker,
                fixed_step: self.fixed_step,
                sub_step,
            };
            hooks.run(CallbackCategory::PreStep, &mut ctx, warnings);

            for (_, _, motion) in tracker.motion_states_mut() {
                motion.begin_step();
            }

            for character in tracker.iter_kind(ObjectKind::Character) {
                if let Err(e) = backend.update_character(character.native, self.fixed_step) {
                    warnings.warn(
                        "stepper.character",
                        format_args!("character {} update failed: {e}", character.index),
                    );
                }
            }

            backend.step(self.fixed_step)?;

            let mut ctx = HookContext {
                backend: &mut *backend,
                tracker: &*tracker,
                fixed_step: self.fixed_step,
                sub_step,
            };
            hooks.run(CallbackCategory::PostStep, &mut ctx, warnings);

            for (index, native, motion) in tracker.motion_states_mut() {
                match backend.pose(native) {
                    Ok(pose) => motion.record(pose),
                    Err(e) => {
                        out.pose_failures += 1;
                        warnings.warn(
                            "stepper.pose",
                            format_args!("pose read for {index} failed: {e}"),
                        );
                    }
                }
            }

            self.accumulator -= self.fixed_step;
            self.total_steps += 1;
            out.sub_steps += 1;
        }

        // Float drift can leave a hair below zero after the last step.
        self.accumulator = self.accumulator.max(0.0);
        out.alpha = if self.interpolate {
            (self.accumulator / self.fixed_step).clamp(0.0, 1.0)
        } else {
            1.0
        };

        for (_, _, motion) in tracker.motion_states_mut() {
            if self.interpolate {
                motion.interpolate(out.alpha);
            } else {
                motion.snap();
            }
        }

        log::trace!(
            "advanced {} fixed steps, alpha {:.3}, banked {:.5}s",
            out.sub_steps,
            out.alpha,
            self.accumulator
        );
        Ok(out)
    }
}
