//! Core types for the Tether physics command protocol.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the handles that cross the protocol boundary, the closed set of
//! object kinds, pose math, the operator/opcode tables, and the error
//! types shared by the buffer, tracker, and engine crates.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod kind;
pub mod math;
pub mod protocol;
pub mod warn;

pub use error::{
    BufferError, DispatchError, EngineError, ExecutorFault, StepError, TrackerError,
};
pub use id::{CorrelationId, Index, NativeHandle};
pub use kind::{MotionType, ObjectKind, TrackedKind};
pub use math::{Pose, Quat, Vec3};
pub use protocol::{
    CleanupOp, CreateOp, ModifyOp, Operator, QueryOp, ReportOp, PROTOCOL_VERSION,
};
pub use warn::WarnOnce;
