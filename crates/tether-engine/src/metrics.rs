//! Per-step performance metrics for the executor.
//!
//! [`StepMetrics`] captures timing and bookkeeping counts for a single
//! call to [`Executor::step`](crate::Executor::step).

/// Timing and counters collected during a single executor step.
///
/// All durations are in microseconds. The executor fills these in after
/// every step; they ride on the [`ResultMessage`](crate::ResultMessage)
/// only when profiling is enabled.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepMetrics {
    /// Wall-clock time for the entire step, in microseconds.
    pub total_us: u64,
    /// Time spent routing the command batch, in microseconds.
    pub command_us: u64,
    /// Time spent inside fixed steps, hooks included, in microseconds.
    pub physics_us: u64,
    /// Time spent blending visible poses and writing transforms, in
    /// microseconds.
    pub interpolation_us: u64,
    /// Fixed steps taken.
    pub sub_steps: u32,
    /// Commands the backend accepted.
    pub commands_applied: u32,
    /// Commands reported back as failed.
    pub commands_failed: u32,
    /// Commands skipped because their index was not live.
    pub stale_handles: u32,
    /// Objects whose pose could not be read after a fixed step.
    pub pose_read_failures: u32,
    /// Seconds of accumulated time discarded by the sub-step cap.
    pub dropped_time: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = StepMetrics::default();
        assert_eq!(m.total_us, 0);
        assert_eq!(m.sub_steps, 0);
        assert_eq!(m.commands_failed, 0);
        assert_eq!(m.dropped_time, 0.0);
    }
}
