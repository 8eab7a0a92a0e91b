//! Per-step callbacks.
//!
//! Hooks run on the executor's thread inside each fixed step: pre-step
//! hooks before the backend advances, post-step hooks right after. They
//! are registered once, before the first step, and get mutable access to
//! the backend and read access to the tracker.

use std::fmt;

use tether_backend::PhysicsBackend;
use tether_core::{EngineError, WarnOnce};
use tether_tracker::Tracker;

/// When a hook runs within a fixed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackCategory {
    /// Before the backend advances.
    PreStep,
    /// After the backend advances, before poses are read.
    PostStep,
}

impl CallbackCategory {
    fn warn_key(self) -> &'static str {
        match self {
            Self::PreStep => "hook.pre_step",
            Self::PostStep => "hook.post_step",
        }
    }
}

/// What a hook can see during a fixed step.
pub struct HookContext<'a> {
    /// The physics backend.
    pub backend: &'a mut dyn PhysicsBackend,
    /// Live objects by index.
    pub tracker: &'a Tracker,
    /// Seconds per fixed step.
    pub fixed_step: f32,
    /// Zero-based fixed step within the current executor step.
    pub sub_step: u32,
}

/// A callback run once per fixed step.
///
/// Implemented for every `FnMut(&mut HookContext) -> Result<(), EngineError>`
/// closure that is `Send`.
pub trait StepHook: Send {
    /// Run the hook. Errors are logged and do not stop the step.
    fn call(&mut self, ctx: &mut HookContext<'_>) -> Result<(), EngineError>;
}

impl<F> StepHook for F
where
    F: FnMut(&mut HookContext<'_>) -> Result<(), EngineError> + Send,
{
    fn call(&mut self, ctx: &mut HookContext<'_>) -> Result<(), EngineError> {
        self(ctx)
    }
}

/// Registered hooks, by category.
#[derive(Default)]
pub(crate) struct Hooks {
    pre_step: Vec<Box<dyn StepHook>>,
    post_step: Vec<Box<dyn StepHook>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_step", &self.pre_step.len())
            .field("post_step", &self.post_step.len())
            .finish()
    }
}

impl Hooks {
    /// Replace every hook in `category`.
    pub(crate) fn set(&mut self, category: CallbackCategory, hooks: Vec<Box<dyn StepHook>>) {
        *self.slot(category) = hooks;
    }

    #[cfg(test)]
    pub(crate) fn len(&self, category: CallbackCategory) -> usize {
        match category {
            CallbackCategory::PreStep => self.pre_step.len(),
            CallbackCategory::PostStep => self.post_step.len(),
        }
    }

    fn slot(&mut self, category: CallbackCategory) -> &mut Vec<Box<dyn StepHook>> {
        match category {
            CallbackCategory::PreStep => &mut self.pre_step,
            CallbackCategory::PostStep => &mut self.post_step,
        }
    }

    /// Run every hook in `category` in registration order.
    pub(crate) fn run(
        &mut self,
        category: CallbackCategory,
        ctx: &mut HookContext<'_>,
        warnings: &mut WarnOnce,
    ) {
        for (i, hook) in self.slot(category).iter_mut().enumerate() {
            if let Err(e) = hook.call(ctx) {
                warnings.warn(
                    category.warn_key(),
                    format_args!("{category:?} hook {i} failed: {e}"),
                );
            }
        }
    }
}
