//! Executor configuration, validation, and error types.

use std::error::Error;
use std::fmt;

use tether_buffer::{BufferConfig, BufferConfigError};
use tether_core::Vec3;

// ── ExecutorConfig ─────────────────────────────────────────────────

/// Everything the executor needs before its first step.
///
/// Sent inside [`Request::CreateExecutor`](crate::Request::CreateExecutor)
/// and checked with [`validate()`](Self::validate) before the backend is
/// touched.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutorConfig {
    /// Seconds per fixed step. Default: 1/60.
    pub fixed_step: f32,
    /// Cap on fixed steps per call. `None` runs every step the
    /// accumulator holds. Default: `None`.
    pub max_sub_steps: Option<u32>,
    /// Blend previous and current poses by the leftover fraction of a
    /// step. When off, the latest pose is reported. Default: true.
    pub interpolate: bool,
    /// Initial world gravity. Default: -9.81 on Y.
    pub gravity: Vec3,
    /// Settings for the results buffers the executor allocates.
    pub buffer: BufferConfig,
    /// Attach [`StepMetrics`](crate::StepMetrics) to every result.
    /// Default: false.
    pub profile: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            fixed_step: 1.0 / 60.0,
            max_sub_steps: None,
            interpolate: true,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            buffer: BufferConfig::default(),
            profile: false,
        }
    }
}

impl ExecutorConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fixed_step.is_finite() || self.fixed_step <= 0.0 {
            return Err(ConfigError::InvalidFixedStep {
                value: self.fixed_step,
            });
        }
        if self.max_sub_steps == Some(0) {
            return Err(ConfigError::InvalidMaxSubSteps);
        }
        if !self.gravity.is_finite() {
            return Err(ConfigError::InvalidGravity);
        }
        self.buffer.validate()?;
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`ExecutorConfig::validate()`] or while
/// bringing an executor up.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `fixed_step` is NaN, infinite, zero, or negative.
    InvalidFixedStep {
        /// The invalid value.
        value: f32,
    },
    /// `max_sub_steps` is `Some(0)`.
    InvalidMaxSubSteps,
    /// Gravity has a NaN or infinite component.
    InvalidGravity,
    /// Results buffer configuration is invalid.
    Buffer(BufferConfigError),
    /// The executor thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFixedStep { value } => {
                write!(f, "fixed_step must be finite and positive, got {value}")
            }
            Self::InvalidMaxSubSteps => write!(f, "max_sub_steps must be at least 1"),
            Self::InvalidGravity => write!(f, "gravity must be finite"),
            Self::Buffer(e) => write!(f, "buffer: {e}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Buffer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BufferConfigError> for ConfigError {
    fn from(e: BufferConfigError) -> Self {
        Self::Buffer(e)
    }
}
