//! Command router: walks a batch and hands each frame to its role.
//!
//! Dispatch is two-level. The `u8` operator picks the role
//! ([`creator`], [`modifier`], [`querier`], [`cleaner`]) and the `u16`
//! opcode picks the handler inside it. Frames carry no length field, so
//! an unknown tag at either level, or an unknown variant tag inside a
//! payload, means every later byte is unreadable: the batch aborts with a
//! [`DispatchError`]. Backend errors, by contrast, fail only their own
//! command and are reported back as
//! [`CommandFailed`](tether_core::ReportOp::CommandFailed) frames.

pub mod cleaner;
pub mod creator;
pub mod modifier;
pub mod querier;

use tether_backend::PhysicsBackend;
use tether_buffer::CommandBuffer;
use tether_core::{
    CleanupOp, CreateOp, DispatchError, EngineError, Index, ModifyOp, Operator, QueryOp,
    WarnOnce,
};
use tether_tracker::Tracker;

use crate::report::{write_failure, CommandFailure, FailureKind};

/// Everything a role handler touches.
pub struct RouteContext<'a> {
    /// The physics backend.
    pub backend: &'a mut dyn PhysicsBackend,
    /// Index to native object map.
    pub tracker: &'a mut Tracker,
    /// Where query hits and failure reports go.
    pub results: &'a mut CommandBuffer,
    /// Deduplicated warnings for stale handles.
    pub warnings: &'a mut WarnOnce,
    /// Seconds per fixed step, used as the duration of kinematic moves.
    pub fixed_step: f32,
    /// Whether new objects get blended pose history.
    pub interpolate: bool,
}

/// Result of one handled command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The backend accepted the command.
    Applied,
    /// The command could not be applied.
    Failed {
        /// Failure class.
        kind: FailureKind,
        /// Object the command addressed or created.
        target: Option<Index>,
    },
    /// The command addressed an index that is not live.
    Skipped,
}

impl Outcome {
    /// Map a backend result onto an outcome.
    pub fn from_result(result: Result<(), EngineError>, target: Option<Index>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(e) => Self::failed(&e, target),
        }
    }

    /// Failure caused by a backend error.
    pub fn failed(e: &EngineError, target: Option<Index>) -> Self {
        log::debug!("command on {target:?} failed: {e}");
        Self::Failed {
            kind: FailureKind::from(e),
            target,
        }
    }
}

/// Counts for one routed batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Commands applied.
    pub applied: u32,
    /// Commands reported as failed.
    pub failed: u32,
    /// Commands skipped for a stale index.
    pub skipped: u32,
}

/// Fail with [`DispatchError::Truncated`] if the last decode ran past the
/// end of the buffer.
///
/// Handlers call this after decoding and before touching the backend.
pub fn ensure_complete(buf: &CommandBuffer) -> Result<(), DispatchError> {
    if buf.overran() {
        return Err(DispatchError::Truncated {
            offset: buf.read_offset(),
        });
    }
    Ok(())
}

/// Route every frame in `commands`, in append order.
///
/// Returns on the first desync. Frames before it have been applied.
pub fn route_batch(
    commands: &mut CommandBuffer,
    ctx: &mut RouteContext<'_>,
) -> Result<BatchStats, DispatchError> {
    commands.rewind();
    let count = commands.commands_count();
    let mut stats = BatchStats::default();

    for ordinal in 0..count {
        let offset = commands.read_offset();
        let tag = commands.read_operator();
        let operator = Operator::from_wire(tag)
            .filter(|op| *op != Operator::Report)
            .ok_or(DispatchError::UnknownOperator { tag, offset })?;
        let opcode = commands.read_command();
        ensure_complete(commands)?;
        let unknown = DispatchError::UnknownOpcode {
            operator: tag,
            opcode,
        };

        let outcome = match operator {
            Operator::Create => {
                let op = CreateOp::from_wire(opcode).ok_or(unknown)?;
                creator::create(op, commands, ctx)?
            }
            Operator::Modify => {
                let op = ModifyOp::from_wire(opcode).ok_or(unknown)?;
                modifier::modify(op, commands, ctx)?
            }
            Operator::Query => {
                let op = QueryOp::from_wire(opcode).ok_or(unknown)?;
                querier::query(op, commands, ctx)?
            }
            Operator::Cleanup => {
                let op = CleanupOp::from_wire(opcode).ok_or(unknown)?;
                cleaner::cleanup(op, commands, ctx)?
            }
            Operator::Report => return Err(unknown),
        };
        ensure_complete(commands)?;

        match outcome {
            Outcome::Applied => stats.applied += 1,
            Outcome::Skipped => stats.skipped += 1,
            Outcome::Failed { kind, target } => {
                stats.failed += 1;
                write_failure(
                    ctx.results,
                    &CommandFailure {
                        ordinal,
                        operator,
                        opcode,
                        target,
                        kind,
                    },
                );
            }
        }
    }

    log::trace!(
        "routed {count} commands: {} applied, {} failed, {} skipped",
        stats.applied,
        stats.failed,
        stats.skipped
    );
    Ok(stats)
}
