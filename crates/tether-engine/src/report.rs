//! Frames the executor writes into the results buffer.
//!
//! A results buffer holds, in order: one
//! [`CommandFailed`](ReportOp::CommandFailed) frame per failed command,
//! one [`QueryHits`](ReportOp::QueryHits) frame per query, and a single
//! trailing [`Transforms`](ReportOp::Transforms) frame. The proxy reads
//! them back with [`read_reports`].

use tether_backend::payload::{decode_list, encode_list};
use tether_backend::QueryHit;
use tether_buffer::codec::{decode_pose, encode_pose};
use tether_buffer::CommandBuffer;
use tether_core::{CorrelationId, DispatchError, EngineError, Index, Operator, Pose, ReportOp};
use tether_tracker::Tracker;

/// Why a single command failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend refused the request.
    Rejected = 0,
    /// The backend lost track of the native object.
    UnknownHandle = 1,
    /// The backend does not implement the feature.
    Unsupported = 2,
    /// A referenced index is not live.
    StaleIndex = 3,
    /// A create command reused a live index.
    IndexInUse = 4,
}

impl FailureKind {
    fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Rejected),
            1 => Some(Self::UnknownHandle),
            2 => Some(Self::Unsupported),
            3 => Some(Self::StaleIndex),
            4 => Some(Self::IndexInUse),
            _ => None,
        }
    }
}

impl From<&EngineError> for FailureKind {
    fn from(e: &EngineError) -> Self {
        match e {
            EngineError::Rejected { .. } => Self::Rejected,
            EngineError::UnknownHandle(_) => Self::UnknownHandle,
            EngineError::Unsupported { .. } => Self::Unsupported,
        }
    }
}

/// One failed command, addressed by its position in the batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandFailure {
    /// Zero-based position of the command in its batch.
    pub ordinal: u16,
    /// Operator of the failed command.
    pub operator: Operator,
    /// Opcode of the failed command.
    pub opcode: u16,
    /// Object the command addressed or created, if any.
    pub target: Option<Index>,
    /// Failure class.
    pub kind: FailureKind,
}

/// A decoded results frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Report {
    /// Visible pose of every object with pose history, by index.
    Transforms(Vec<(Index, Pose)>),
    /// Answer to one query.
    QueryHits {
        /// Correlation id from the query command.
        correlation: CorrelationId,
        /// Hits, nearest first.
        hits: Vec<QueryHit>,
    },
    /// A command the backend could not apply.
    CommandFailed(CommandFailure),
}

/// Append a transforms frame covering every tracked motion state.
///
/// The entry count is reserved up front and patched once the entries are
/// written. Returns the number of entries.
pub fn write_transforms(buf: &mut CommandBuffer, tracker: &Tracker) -> u32 {
    buf.write_frame(Operator::Report as u8, ReportOp::Transforms.to_wire());
    let slot = buf.reserve::<u32>();
    let mut count = 0u32;
    for (index, motion) in tracker.motion_states() {
        buf.write(index);
        encode_pose(buf, &motion.visible);
        count += 1;
    }
    buf.write_reserved(slot, count);
    count
}

/// Append the answer to one query.
pub fn write_query_hits(buf: &mut CommandBuffer, correlation: CorrelationId, hits: &[QueryHit]) {
    buf.write_frame(Operator::Report as u8, ReportOp::QueryHits.to_wire());
    buf.write(correlation);
    encode_list(buf, hits);
}

/// Append a failure notice.
pub fn write_failure(buf: &mut CommandBuffer, failure: &CommandFailure) {
    buf.write_frame(Operator::Report as u8, ReportOp::CommandFailed.to_wire());
    buf.write(failure.ordinal);
    buf.write(failure.operator as u8);
    buf.write(failure.opcode);
    buf.write_optional(failure.target);
    buf.write(failure.kind as u8);
}

/// Decode every frame in a results buffer, from the start.
pub fn read_reports(buf: &mut CommandBuffer) -> Result<Vec<Report>, DispatchError> {
    buf.rewind();
    let count = buf.commands_count();
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = buf.read_offset();
        let tag = buf.read_operator();
        if Operator::from_wire(tag) != Some(Operator::Report) {
            return Err(DispatchError::UnknownOperator { tag, offset });
        }
        let opcode = buf.read_command();
        let op = ReportOp::from_wire(opcode).ok_or(DispatchError::UnknownOpcode {
            operator: tag,
            opcode,
        })?;
        let report = match op {
            ReportOp::Transforms => {
                let n = buf.read::<u32>() as usize;
                let mut entries = Vec::with_capacity(n.min(buf.remaining()));
                for _ in 0..n {
                    let index = buf.read();
                    entries.push((index, decode_pose(buf)));
                }
                Report::Transforms(entries)
            }
            ReportOp::QueryHits => Report::QueryHits {
                correlation: buf.read(),
                hits: decode_list(buf)?,
            },
            ReportOp::CommandFailed => Report::CommandFailed(read_failure(buf)?),
        };
        if buf.overran() {
            return Err(DispatchError::Truncated {
                offset: buf.read_offset(),
            });
        }
        out.push(report);
    }
    Ok(out)
}

fn read_failure(buf: &mut CommandBuffer) -> Result<CommandFailure, DispatchError> {
    let ordinal = buf.read();
    let operator_tag = buf.read::<u8>();
    let opcode = buf.read();
    let target = buf.read_optional();
    let kind_tag = buf.read::<u8>();
    let operator = Operator::from_wire(operator_tag).ok_or(DispatchError::UnknownVariant {
        what: "failed operator",
        tag: operator_tag,
    })?;
    let kind = FailureKind::from_wire(kind_tag).ok_or(DispatchError::UnknownVariant {
        what: "failure kind",
        tag: kind_tag,
    })?;
    Ok(CommandFailure {
        ordinal,
        operator,
        opcode,
        target,
        kind,
    })
}
