//! The physics backend seam.
//!
//! The executor never looks inside the solver. It hands the backend
//! decoded descriptors, keeps the returned [`NativeHandle`]s in its
//! tracker, and asks for one fixed step at a time. Backends live on the
//! executor's thread only, hence `Send` but not `Sync`.

use tether_core::{EngineError, MotionType, NativeHandle, Pose, Vec3};

use crate::body::BodyDesc;
use crate::character::{CharacterDesc, CharacterInput};
use crate::constraint::{ConstraintDesc, ConstraintParams};
use crate::query::HitPolicy;
use crate::shape::ShapeDesc;

/// Constants a backend advertises during the executor handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Protocol version the executor speaks.
    pub protocol_version: u16,
    /// Human-readable backend name.
    pub backend: String,
    /// Upper bound on live bodies, if the backend has one.
    pub max_bodies: Option<u32>,
    /// Whether [`PhysicsBackend::cast_shape`] is implemented.
    pub shape_casts: bool,
    /// Whether character controllers are implemented.
    pub characters: bool,
}

/// Collision shape handed to [`PhysicsBackend::create_body`].
#[derive(Clone, Copy, Debug)]
pub enum ShapeRef<'a> {
    /// Described in the same command.
    Inline(&'a ShapeDesc),
    /// Created earlier by [`PhysicsBackend::create_shape`].
    Native(NativeHandle),
}

/// Filters applied to a cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CastFilter {
    /// First hit or all hits.
    pub policy: HitPolicy,
    /// Object to skip.
    pub ignore: Option<NativeHandle>,
    /// Only objects sharing a bit with this mask are hit.
    pub layer_mask: u32,
    /// Compute surface normals.
    pub want_normals: bool,
}

/// A cast hit in backend terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackendHit {
    /// Object that was hit.
    pub native: NativeHandle,
    /// World-space contact point.
    pub point: Vec3,
    /// Surface normal, when requested.
    pub normal: Option<Vec3>,
    /// Fraction of the cast distance at the hit.
    pub fraction: f32,
}

/// A physics engine driven one fixed step at a time.
///
/// Every fallible call reports [`EngineError`]. Errors from creation,
/// modification and queries fail that single command; an error from
/// [`step`](Self::step) faults the executor.
pub trait PhysicsBackend: Send {
    /// Handshake constants.
    fn capabilities(&self) -> Capabilities;

    // ── Creation ───────────────────────────────────────────────────

    /// Build a reusable shape.
    fn create_shape(&mut self, shape: &ShapeDesc) -> Result<NativeHandle, EngineError>;

    /// Build a rigid body.
    fn create_body(
        &mut self,
        desc: &BodyDesc,
        shape: ShapeRef<'_>,
    ) -> Result<NativeHandle, EngineError>;

    /// Join two existing bodies.
    fn create_constraint(
        &mut self,
        desc: &ConstraintDesc,
        body_a: NativeHandle,
        body_b: NativeHandle,
    ) -> Result<NativeHandle, EngineError>;

    /// Build a character controller.
    fn create_character(&mut self, desc: &CharacterDesc) -> Result<NativeHandle, EngineError>;

    /// Release any object.
    fn destroy(&mut self, handle: NativeHandle) -> Result<(), EngineError>;

    // ── Modification ───────────────────────────────────────────────

    /// Set linear velocity.
    fn set_linear_velocity(&mut self, handle: NativeHandle, v: Vec3) -> Result<(), EngineError>;

    /// Set angular velocity.
    fn set_angular_velocity(&mut self, handle: NativeHandle, w: Vec3)
        -> Result<(), EngineError>;

    /// Accumulate a force for the next step.
    fn add_force(
        &mut self,
        handle: NativeHandle,
        force: Vec3,
        at: Option<Vec3>,
    ) -> Result<(), EngineError>;

    /// Apply an impulse now.
    fn add_impulse(
        &mut self,
        handle: NativeHandle,
        impulse: Vec3,
        at: Option<Vec3>,
    ) -> Result<(), EngineError>;

    /// Set world gravity.
    fn set_gravity(&mut self, gravity: Vec3) -> Result<(), EngineError>;

    /// Enable or disable a body or constraint.
    fn set_enabled(&mut self, handle: NativeHandle, enabled: bool) -> Result<(), EngineError>;

    /// Change a body's motion type.
    fn set_motion_type(
        &mut self,
        handle: NativeHandle,
        motion: MotionType,
    ) -> Result<(), EngineError>;

    /// Drive a kinematic body to `target` over `dt` seconds.
    fn move_kinematic(
        &mut self,
        handle: NativeHandle,
        target: Pose,
        dt: f32,
    ) -> Result<(), EngineError>;

    /// Teleport.
    fn set_transform(
        &mut self,
        handle: NativeHandle,
        pose: Pose,
        wake: bool,
    ) -> Result<(), EngineError>;

    /// Wake a sleeping body.
    fn wake(&mut self, handle: NativeHandle) -> Result<(), EngineError>;

    /// Store a character's movement input for its next update.
    fn set_character_input(
        &mut self,
        handle: NativeHandle,
        input: &CharacterInput,
    ) -> Result<(), EngineError>;

    /// Change spring, limits or motor on a live constraint.
    fn update_constraint(
        &mut self,
        handle: NativeHandle,
        params: &ConstraintParams,
    ) -> Result<(), EngineError>;

    // ── Queries ────────────────────────────────────────────────────

    /// Cast a ray covering `origin + t * direction`, `t` in `[0, 1]`.
    fn cast_ray(
        &mut self,
        origin: Vec3,
        direction: Vec3,
        filter: &CastFilter,
    ) -> Result<Vec<BackendHit>, EngineError>;

    /// Sweep `shape` from `start` along `direction`.
    fn cast_shape(
        &mut self,
        shape: &ShapeDesc,
        start: &Pose,
        direction: Vec3,
        filter: &CastFilter,
    ) -> Result<Vec<BackendHit>, EngineError> {
        let _ = (shape, start, direction, filter);
        Err(EngineError::Unsupported {
            feature: "shape casts",
        })
    }

    // ── Stepping ───────────────────────────────────────────────────

    /// Advance a character controller by `dt`. Runs before
    /// [`step`](Self::step) within each fixed step.
    fn update_character(&mut self, handle: NativeHandle, dt: f32) -> Result<(), EngineError>;

    /// Advance the world by exactly one fixed step.
    fn step(&mut self, dt: f32) -> Result<(), EngineError>;

    /// Current pose of a body or character.
    fn pose(&self, handle: NativeHandle) -> Result<Pose, EngineError>;
}
