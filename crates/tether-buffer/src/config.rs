//! Buffer sizing and growth policy.

use std::error::Error;
use std::fmt;

use crate::buffer::HEADER_LEN;

// ── Growth ─────────────────────────────────────────────────────────

/// How a [`CommandBuffer`](crate::CommandBuffer) grows when a write does
/// not fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Growth {
    /// Never grow. Writes that do not fit are dropped.
    Disabled,
    /// Grow by half of the current capacity (at least enough for the write).
    #[default]
    Proportional,
    /// Grow by a fixed number of bytes (at least enough for the write).
    Fixed(usize),
}

impl Growth {
    /// New capacity needed to hold `required` bytes, or `None` if growth
    /// is disabled.
    pub(crate) fn next_capacity(self, current: usize, required: usize) -> Option<usize> {
        let grown = match self {
            Self::Disabled => return None,
            Self::Proportional => current.saturating_add(current / 2),
            Self::Fixed(step) => current.saturating_add(step),
        };
        Some(grown.max(required))
    }
}

// ── BufferConfig ───────────────────────────────────────────────────

/// Sizing for a command buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferConfig {
    /// Bytes allocated up front, including the command counter. Default: 1024.
    pub initial_capacity: usize,
    /// Growth policy. Default: [`Growth::Proportional`].
    pub growth: Growth,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            growth: Growth::Proportional,
        }
    }
}

impl BufferConfig {
    /// A buffer that never grows past `capacity` bytes.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            initial_capacity: capacity,
            growth: Growth::Disabled,
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), BufferConfigError> {
        if self.initial_capacity < HEADER_LEN {
            return Err(BufferConfigError::CapacityTooSmall {
                configured: self.initial_capacity,
            });
        }
        if self.growth == Growth::Fixed(0) {
            return Err(BufferConfigError::ZeroGrowthStep);
        }
        Ok(())
    }
}

// ── BufferConfigError ──────────────────────────────────────────────

/// Errors detected by [`BufferConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferConfigError {
    /// Initial capacity cannot hold the command counter.
    CapacityTooSmall {
        /// The configured capacity.
        configured: usize,
    },
    /// `Growth::Fixed(0)` would never make room.
    ZeroGrowthStep,
}

impl fmt::Display for BufferConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityTooSmall { configured } => write!(
                f,
                "initial_capacity {configured} is below the {HEADER_LEN}-byte header"
            ),
            Self::ZeroGrowthStep => write!(f, "fixed growth step must be non-zero"),
        }
    }
}

impl Error for BufferConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(BufferConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_tiny_capacity() {
        let cfg = BufferConfig::fixed(1);
        assert_eq!(
            cfg.validate(),
            Err(BufferConfigError::CapacityTooSmall { configured: 1 })
        );
    }

    #[test]
    fn rejects_zero_step() {
        let cfg = BufferConfig {
            initial_capacity: 64,
            growth: Growth::Fixed(0),
        };
        assert_eq!(cfg.validate(), Err(BufferConfigError::ZeroGrowthStep));
    }

    #[test]
    fn growth_covers_request() {
        assert_eq!(Growth::Proportional.next_capacity(100, 120), Some(150));
        assert_eq!(Growth::Proportional.next_capacity(100, 400), Some(400));
        assert_eq!(Growth::Fixed(8).next_capacity(100, 104), Some(108));
        assert_eq!(Growth::Disabled.next_capacity(100, 104), None);
    }
}
