//! Messages exchanged between the proxy and the executor host.
//!
//! Buffers travel by value. Each side gives up its buffer when it sends
//! and gets one back in the reply, so a pair of buffers ping-pongs across
//! the boundary without being copied or reallocated.

use std::fmt;

use tether_backend::Capabilities;
use tether_buffer::CommandBuffer;
use tether_core::{CorrelationId, ExecutorFault, StepError};

use crate::config::{ConfigError, ExecutorConfig};
use crate::hooks::{CallbackCategory, StepHook};
use crate::metrics::StepMetrics;

/// One batch of commands plus the frame time to simulate.
#[derive(Debug)]
pub struct StepMessage {
    /// Commands to route, in append order.
    pub buffer: CommandBuffer,
    /// Caller frame time in seconds.
    pub dt: f32,
    /// Echoed on the matching [`ResultMessage`].
    pub correlation_id: CorrelationId,
    /// A results buffer the caller has finished reading, for reuse.
    pub recycled: Option<CommandBuffer>,
}

/// The executor's answer to a [`StepMessage`].
#[derive(Debug)]
pub struct ResultMessage {
    /// Failure reports, query hits and transforms.
    pub buffer: CommandBuffer,
    /// Fixed steps taken since the executor was created.
    pub step_count: u64,
    /// Set to the correlation id when profiling is enabled.
    pub perf_id: Option<u32>,
    /// Copied from the step request.
    pub correlation_id: CorrelationId,
    /// The request's command buffer, reset and ready for the next batch.
    pub recycled: Option<CommandBuffer>,
    /// Sticky fault, if the executor is faulted.
    pub fault: Option<ExecutorFault>,
    /// Timings for this step when profiling is enabled.
    pub metrics: Option<StepMetrics>,
}

/// Caller-to-executor message.
pub enum Request {
    /// Build the executor. Must precede every other request.
    CreateExecutor(ExecutorConfig),
    /// Replace the hooks of one category. Only valid before the first step.
    OverrideCallbacks {
        /// Which hooks to replace.
        category: CallbackCategory,
        /// New hooks, run in order.
        hooks: Vec<Box<dyn StepHook>>,
    },
    /// Route a batch and advance time.
    Step(StepMessage),
    /// Drop the executor and its backend.
    Destroy,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateExecutor(config) => f.debug_tuple("CreateExecutor").field(config).finish(),
            Self::OverrideCallbacks { category, hooks } => f
                .debug_struct("OverrideCallbacks")
                .field("category", category)
                .field("hooks", &hooks.len())
                .finish(),
            Self::Step(msg) => f.debug_tuple("Step").field(msg).finish(),
            Self::Destroy => f.write_str("Destroy"),
        }
    }
}

/// Executor-to-caller message.
#[derive(Debug)]
pub enum Response {
    /// The executor is up.
    Ready(Capabilities),
    /// `CreateExecutor` carried an unusable configuration.
    CreateFailed(ConfigError),
    /// Answer to a step.
    Result(ResultMessage),
    /// A request could not be honoured.
    Rejected(StepError),
    /// The executor has been dropped.
    Destroyed,
}
