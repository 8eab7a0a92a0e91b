//! Physics backend seam and command payload schemas.
//!
//! [`PhysicsBackend`] is the narrow interface the executor drives: create
//! and destroy objects, mutate their state, cast queries, and advance one
//! fixed step. The payload types describe what travels in each frame and
//! carry paired encoders and decoders, so both sides of the protocol
//! share a single field order.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod body;
pub mod character;
pub mod cleanup;
pub mod constraint;
pub mod modify;
pub mod payload;
pub mod query;
pub mod shape;

pub use backend::{BackendHit, CastFilter, Capabilities, PhysicsBackend, ShapeRef};
pub use body::{BodyDesc, ShapeSource};
pub use character::{CharacterDesc, CharacterInput};
pub use cleanup::DestroyCommand;
pub use constraint::{ConstraintDesc, ConstraintKind, ConstraintParams, Limits, Motor, Spring};
pub use modify::ModifyCommand;
pub use payload::{Command, Payload};
pub use query::{HitPolicy, QueryHit, RayQuery, ShapeQuery};
pub use shape::{CompoundChild, ShapeCreate, ShapeDesc};
