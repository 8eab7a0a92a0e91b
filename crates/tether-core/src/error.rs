//! Error types for the Tether protocol.
//!
//! Organized by failure class: buffer encoding, stream dispatch (fatal
//! desync), backend rejections (per-command), executor faults (sticky),
//! and tracker bookkeeping.

use std::error::Error;
use std::fmt;

use crate::id::{Index, NativeHandle};

/// Errors from the strict command buffer accessors.
///
/// The lenient `write`/`read` paths log and continue instead; these are
/// returned only by `try_*` calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferError {
    /// Growth is disabled and the write does not fit.
    CapacityExhausted {
        /// Bytes the write needed.
        requested: usize,
        /// Bytes still free.
        available: usize,
    },
    /// A read would run past the written region.
    ReadPastEnd {
        /// Read cursor at the time of the read.
        offset: usize,
        /// Bytes the read needed.
        wanted: usize,
    },
    /// A presence flag held something other than 0 or 1.
    InvalidPresenceFlag {
        /// Offset of the flag byte.
        offset: usize,
        /// The byte found.
        value: u8,
    },
    /// No side blob with this id is attached.
    UnknownBlob {
        /// The requested blob id.
        id: u32,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExhausted { requested, available } => write!(
                f,
                "buffer growth disabled: need {requested} bytes, {available} available"
            ),
            Self::ReadPastEnd { offset, wanted } => {
                write!(f, "read of {wanted} bytes at offset {offset} runs past end")
            }
            Self::InvalidPresenceFlag { offset, value } => {
                write!(f, "invalid presence flag {value} at offset {offset}")
            }
            Self::UnknownBlob { id } => write!(f, "no side blob with id {id}"),
        }
    }
}

impl Error for BufferError {}

/// The command stream can no longer be trusted.
///
/// Frames carry no length field, so once a tag is unrecognized every
/// later byte offset is suspect. The remaining batch is abandoned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchError {
    /// The operator byte names no subsystem.
    UnknownOperator {
        /// The byte found.
        tag: u8,
        /// Offset of the operator byte.
        offset: usize,
    },
    /// The opcode is not defined for its operator.
    UnknownOpcode {
        /// Operator byte of the frame.
        operator: u8,
        /// The opcode found.
        opcode: u16,
    },
    /// A payload variant tag (shape kind, constraint kind, ...) is unknown.
    UnknownVariant {
        /// Which variant family was being decoded.
        what: &'static str,
        /// The tag found.
        tag: u8,
    },
    /// A frame ended before its payload was fully read.
    Truncated {
        /// Read cursor when the overrun was detected.
        offset: usize,
    },
    /// A frame names a side blob the buffer does not carry.
    MissingBlob {
        /// The blob id read from the frame.
        id: u32,
    },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOperator { tag, offset } => {
                write!(f, "unknown operator {tag} at offset {offset}")
            }
            Self::UnknownOpcode { operator, opcode } => {
                write!(f, "unknown opcode {opcode} for operator {operator}")
            }
            Self::UnknownVariant { what, tag } => write!(f, "unknown {what} tag {tag}"),
            Self::Truncated { offset } => write!(f, "frame truncated at offset {offset}"),
            Self::MissingBlob { id } => write!(f, "side blob {id} is missing"),
        }
    }
}

impl Error for DispatchError {}

/// A backend call failed for one command.
///
/// Reported back to the caller as a failed command; the batch continues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// The backend refused the request.
    Rejected {
        /// Human-readable description.
        reason: String,
    },
    /// The backend does not know this native handle.
    UnknownHandle(NativeHandle),
    /// The backend does not implement this feature.
    Unsupported {
        /// Name of the missing feature.
        feature: &'static str,
    },
}

impl EngineError {
    /// Shorthand for [`EngineError::Rejected`].
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { reason } => write!(f, "backend rejected request: {reason}"),
            Self::UnknownHandle(h) => write!(f, "backend has no object {h}"),
            Self::Unsupported { feature } => write!(f, "backend does not support {feature}"),
        }
    }
}

impl Error for EngineError {}

/// Why an executor stopped accepting steps.
///
/// Sticky: once set, every step is rejected until the fault is cleared
/// or the executor is recreated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutorFault {
    /// The command stream desynchronized.
    Desync(DispatchError),
    /// The backend failed while advancing a fixed step.
    EngineStep(EngineError),
}

impl fmt::Display for ExecutorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desync(e) => write!(f, "command stream desync: {e}"),
            Self::EngineStep(e) => write!(f, "physics step failed: {e}"),
        }
    }
}

impl Error for ExecutorFault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Desync(e) => Some(e),
            Self::EngineStep(e) => Some(e),
        }
    }
}

/// Errors returned when a step or control request cannot be honored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepError {
    /// The executor carries a sticky fault.
    Faulted(ExecutorFault),
    /// No executor has been created yet.
    NotCreated,
    /// Callbacks can only be overridden before the first step.
    CallbacksLocked,
    /// The executor has been destroyed.
    Destroyed,
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Faulted(fault) => write!(f, "executor faulted: {fault}"),
            Self::NotCreated => write!(f, "executor not created"),
            Self::CallbacksLocked => write!(f, "callbacks are locked after the first step"),
            Self::Destroyed => write!(f, "executor destroyed"),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Faulted(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Errors from object tracker bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerError {
    /// The index already maps to a live object.
    IndexInUse(Index),
    /// A constraint names an endpoint that is not tracked.
    UnknownEndpoint(Index),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexInUse(i) => write!(f, "index {i} is already live"),
            Self::UnknownEndpoint(i) => write!(f, "constraint endpoint {i} is not tracked"),
        }
    }
}

impl Error for TrackerError {}
