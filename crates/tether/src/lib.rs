//! Tether: a binary command protocol between a game thread and a physics
//! executor.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Tether sub-crates. For most users, adding `tether` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use tether::prelude::*;
//! use tether_test_utils::{fixtures, TestBackend};
//!
//! let messenger = InlineMessenger::new(|| Box::new(TestBackend::new()) as Box<dyn PhysicsBackend>);
//! let mut proxy: Proxy<Pose, _> = Proxy::new(messenger, ExecutorConfig::default()).unwrap();
//! proxy.poll().unwrap();
//!
//! let ball = proxy.create_body(
//!     Pose::from_position(Vec3::new(0.0, 2.0, 0.0)),
//!     fixtures::falling_sphere(0, Vec3::ZERO),
//! );
//! proxy.step(1.5 / 60.0).unwrap();
//! proxy.poll().unwrap();
//! assert!(proxy.node(ball).unwrap().position.y < 2.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tether-core` | Handles, poses, protocol tables, errors |
//! | [`buffer`] | `tether-buffer` | The growable binary command buffer |
//! | [`tracker`] | `tether-tracker` | Index allocator, object tracker, motion history |
//! | [`backend`] | `tether-backend` | Backend trait and command payloads |
//! | [`engine`] | `tether-engine` | Executor, router, stepper, messengers, proxy |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core handles, pose math, and protocol tables (`tether-core`).
pub use tether_core as types;

/// Binary command buffer (`tether-buffer`).
///
/// [`buffer::CommandBuffer`] is what travels between the proxy and the
/// executor, in both directions.
pub use tether_buffer as buffer;

/// Index allocation and object bookkeeping (`tether-tracker`).
pub use tether_tracker as tracker;

/// Physics backend seam and payload schemas (`tether-backend`).
///
/// Implement [`backend::PhysicsBackend`] to plug a physics engine in.
pub use tether_backend as backend;

/// Executor, router, fixed-step stepper, and proxy (`tether-engine`).
///
/// [`engine::InlineMessenger`] runs the executor on the calling thread,
/// [`engine::WorkerMessenger`] on a dedicated one.
pub use tether_engine as engine;

/// Common imports for typical Tether usage.
///
/// ```rust
/// use tether::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use tether_core::{CorrelationId, Index, MotionType, Pose, Quat, Vec3};

    // Errors
    pub use tether_core::{DispatchError, EngineError, ExecutorFault, StepError};

    // Buffer
    pub use tether_buffer::{BufferConfig, CommandBuffer};

    // Backend seam and payloads
    pub use tether_backend::{
        BodyDesc, CharacterDesc, CharacterInput, Command, ConstraintDesc, ConstraintKind,
        HitPolicy, ModifyCommand, PhysicsBackend, QueryHit, RayQuery, ShapeDesc, ShapeQuery,
    };

    // Engine
    pub use tether_engine::{
        DispatchOutcome, Executor, ExecutorConfig, InlineMessenger, Messenger, Proxy, ProxyError,
        ProxyState, SceneNode, StepMetrics, WorkerMessenger,
    };
}
