//! Deterministic reference backend.
//!
//! Semi-implicit Euler under gravity, bounding-sphere casts, and a flat
//! ground plane at `y = 0` for characters. Constraints are recorded but
//! not solved. Enough to drive the protocol end to end, not a solver.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tether_backend::{
    BackendHit, BodyDesc, Capabilities, CastFilter, CharacterDesc, CharacterInput,
    ConstraintDesc, ConstraintParams, HitPolicy, PhysicsBackend, ShapeDesc, ShapeRef,
};
use tether_core::{EngineError, MotionType, NativeHandle, Pose, Quat, Vec3, PROTOCOL_VERSION};

/// Standard gravity used by [`TestBackend::new`].
pub const EARTH_GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

// ── Probe ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ProbeState {
    steps: u32,
    woken: Vec<NativeHandle>,
    destroyed: Vec<NativeHandle>,
    created: u32,
    fail_steps: bool,
    reject_creates: bool,
    fail_pose: HashSet<NativeHandle>,
}

/// Shared view into a [`TestBackend`] that stays usable after the
/// backend moves into an executor or worker thread.
#[derive(Clone, Debug, Default)]
pub struct BackendProbe {
    inner: Arc<Mutex<ProbeState>>,
}

impl BackendProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        // A panicking test thread must not hide the log from the others.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fixed steps advanced so far.
    pub fn steps(&self) -> u32 {
        self.lock().steps
    }

    /// Objects created so far.
    pub fn created(&self) -> u32 {
        self.lock().created
    }

    /// Handles passed to `wake`, in call order.
    pub fn woken(&self) -> Vec<NativeHandle> {
        self.lock().woken.clone()
    }

    /// Handles passed to `destroy`, in call order.
    pub fn destroyed(&self) -> Vec<NativeHandle> {
        self.lock().destroyed.clone()
    }

    /// Make every following `step` fail.
    pub fn fail_steps(&self, fail: bool) {
        self.lock().fail_steps = fail;
    }

    /// Make every following creation fail.
    pub fn reject_creates(&self, reject: bool) {
        self.lock().reject_creates = reject;
    }

    /// Make pose reads for `handle` fail.
    pub fn fail_pose(&self, handle: NativeHandle) {
        self.lock().fail_pose.insert(handle);
    }
}

// ── Objects ────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Body {
    pose: Pose,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    motion: MotionType,
    inv_mass: f32,
    radius: f32,
    layers: u32,
    gravity_factor: f32,
    linear_damping: f32,
    enabled: bool,
    force: Vec3,
    kinematic_target: Option<Pose>,
}

#[derive(Clone, Debug)]
struct Character {
    pose: Pose,
    radius: f32,
    half_height: f32,
    layers: u32,
    input: CharacterInput,
    vertical_speed: f32,
}

#[derive(Clone, Debug)]
enum Object {
    Body(Body),
    Character(Character),
    Shape(ShapeDesc),
    Constraint {
        enabled: bool,
        params: ConstraintParams,
    },
}

/// Reference [`PhysicsBackend`] for tests and examples.
#[derive(Debug)]
pub struct TestBackend {
    gravity: Vec3,
    next_handle: u64,
    objects: HashMap<NativeHandle, Object>,
    probe: BackendProbe,
}

impl Default for TestBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBackend {
    /// Empty world under [`EARTH_GRAVITY`].
    pub fn new() -> Self {
        Self::with_gravity(EARTH_GRAVITY)
    }

    /// Empty world under `gravity`.
    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            gravity,
            next_handle: 1,
            objects: HashMap::new(),
            probe: BackendProbe::default(),
        }
    }

    /// Shared probe into this backend.
    pub fn probe(&self) -> BackendProbe {
        self.probe.clone()
    }

    /// Current gravity.
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Live objects of every kind.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Linear velocity of a body.
    pub fn linear_velocity(&self, handle: NativeHandle) -> Option<Vec3> {
        match self.objects.get(&handle)? {
            Object::Body(b) => Some(b.linear_velocity),
            _ => None,
        }
    }

    /// Enabled flag and current parameters of a constraint.
    pub fn constraint(&self, handle: NativeHandle) -> Option<(bool, ConstraintParams)> {
        match self.objects.get(&handle)? {
            Object::Constraint { enabled, params } => Some((*enabled, *params)),
            _ => None,
        }
    }

    fn insert(&mut self, object: Object) -> Result<NativeHandle, EngineError> {
        {
            let mut probe = self.probe.lock();
            if probe.reject_creates {
                return Err(EngineError::rejected("creation disabled by probe"));
            }
            probe.created += 1;
        }
        let handle = NativeHandle(self.next_handle);
        self.next_handle += 1;
        self.objects.insert(handle, object);
        Ok(handle)
    }

    fn object_mut(&mut self, handle: NativeHandle) -> Result<&mut Object, EngineError> {
        self.objects
            .get_mut(&handle)
            .ok_or(EngineError::UnknownHandle(handle))
    }

    fn body_mut(&mut self, handle: NativeHandle) -> Result<&mut Body, EngineError> {
        match self.object_mut(handle)? {
            Object::Body(b) => Ok(b),
            _ => Err(EngineError::rejected(format!("{handle} is not a body"))),
        }
    }

    fn hits(&self, origin: Vec3, direction: Vec3, inflate: f32, filter: &CastFilter) -> Vec<BackendHit> {
        let mut hits: Vec<BackendHit> = self
            .objects
            .iter()
            .filter(|(h, _)| Some(**h) != filter.ignore)
            .filter_map(|(h, o)| {
                let (center, radius, layers) = match o {
                    Object::Body(b) if b.enabled => (b.pose.position, b.radius, b.layers),
                    Object::Character(c) => (c.pose.position, c.radius + c.half_height, c.layers),
                    _ => return None,
                };
                if layers & filter.layer_mask == 0 {
                    return None;
                }
                let t = ray_sphere(origin, direction, center, radius + inflate)?;
                let at = origin + direction * t;
                let point = if inflate > 0.0 {
                    center + (at - center).normalize_or_zero() * radius
                } else {
                    at
                };
                let normal = filter
                    .want_normals
                    .then(|| (point - center).try_normalize().unwrap_or(-direction.normalize_or_zero()));
                Some(BackendHit {
                    native: *h,
                    point,
                    normal,
                    fraction: t,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction).then(a.native.cmp(&b.native)));
        if filter.policy == HitPolicy::First {
            hits.truncate(1);
        }
        hits
    }
}

/// Smallest `t` in `[0, 1]` where `origin + t * dir` is inside the sphere.
fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let m = origin - center;
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let a = dir.length_squared();
    if a == 0.0 {
        return None;
    }
    let b = m.dot(dir);
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / a;
    (0.0..=1.0).contains(&t).then_some(t)
}

fn validate_shape(shape: &ShapeDesc) -> Result<(), EngineError> {
    let ok = match shape {
        ShapeDesc::Sphere { radius } => *radius > 0.0,
        ShapeDesc::Box { half_extents } => half_extents.min_element() > 0.0,
        ShapeDesc::Capsule { half_height, radius }
        | ShapeDesc::Cylinder { half_height, radius } => *half_height >= 0.0 && *radius > 0.0,
        ShapeDesc::ConvexHull { points } => points.len() >= 4,
        ShapeDesc::Mesh {
            vertices,
            triangles,
        } => {
            !triangles.is_empty()
                && triangles
                    .iter()
                    .flatten()
                    .all(|i| (*i as usize) < vertices.len())
        }
        ShapeDesc::HeightField {
            samples_per_side,
            heights,
            ..
        } => {
            *samples_per_side >= 2
                && heights.len() == (*samples_per_side as usize).pow(2)
        }
        ShapeDesc::Compound { children } => {
            !children.is_empty()
                && children
                    .iter()
                    .all(|c| validate_shape(&c.shape).is_ok())
        }
    };
    if ok {
        Ok(())
    } else {
        Err(EngineError::rejected("degenerate shape"))
    }
}

impl PhysicsBackend for TestBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            protocol_version: PROTOCOL_VERSION,
            backend: "tether-test".into(),
            max_bodies: None,
            shape_casts: true,
            characters: true,
        }
    }

    fn create_shape(&mut self, shape: &ShapeDesc) -> Result<NativeHandle, EngineError> {
        validate_shape(shape)?;
        self.insert(Object::Shape(shape.clone()))
    }

    fn create_body(
        &mut self,
        desc: &BodyDesc,
        shape: ShapeRef<'_>,
    ) -> Result<NativeHandle, EngineError> {
        let shape = match shape {
            ShapeRef::Inline(s) => {
                validate_shape(s)?;
                s.clone()
            }
            ShapeRef::Native(h) => match self.objects.get(&h) {
                Some(Object::Shape(s)) => s.clone(),
                Some(_) => return Err(EngineError::rejected(format!("{h} is not a shape"))),
                None => return Err(EngineError::UnknownHandle(h)),
            },
        };
        let fixed_geometry = matches!(shape, ShapeDesc::Mesh { .. } | ShapeDesc::HeightField { .. });
        if fixed_geometry && desc.motion == MotionType::Dynamic {
            return Err(EngineError::rejected("mesh and height field bodies cannot be dynamic"));
        }

        let radius = shape.bounding_radius();
        let inv_mass = match desc.motion {
            MotionType::Dynamic => {
                let mass = desc.mass.unwrap_or_else(|| radius.powi(3).max(1e-3));
                if mass <= 0.0 {
                    return Err(EngineError::rejected("mass must be positive"));
                }
                1.0 / mass
            }
            _ => 0.0,
        };
        self.insert(Object::Body(Body {
            pose: desc.pose,
            linear_velocity: desc.linear_velocity.unwrap_or(Vec3::ZERO),
            angular_velocity: desc.angular_velocity.unwrap_or(Vec3::ZERO),
            motion: desc.motion,
            inv_mass,
            radius,
            layers: desc.layers,
            gravity_factor: desc.gravity_factor,
            linear_damping: desc.linear_damping,
            enabled: true,
            force: Vec3::ZERO,
            kinematic_target: None,
        }))
    }

    fn create_constraint(
        &mut self,
        desc: &ConstraintDesc,
        body_a: NativeHandle,
        body_b: NativeHandle,
    ) -> Result<NativeHandle, EngineError> {
        for end in [body_a, body_b] {
            match self.objects.get(&end) {
                Some(Object::Body(_)) => {}
                Some(_) => return Err(EngineError::rejected(format!("{end} is not a body"))),
                None => return Err(EngineError::UnknownHandle(end)),
            }
        }
        if body_a == body_b {
            return Err(EngineError::rejected("constraint endpoints must differ"));
        }
        log::trace!("constraint {:?} between {body_a} and {body_b}", desc.kind);
        self.insert(Object::Constraint {
            enabled: true,
            params: ConstraintParams::default(),
        })
    }

    fn create_character(&mut self, desc: &CharacterDesc) -> Result<NativeHandle, EngineError> {
        validate_shape(&desc.shape)?;
        let (half_height, radius) = match desc.shape {
            ShapeDesc::Capsule {
                half_height,
                radius,
            }
            | ShapeDesc::Cylinder {
                half_height,
                radius,
            } => (half_height, radius),
            ref other => (0.0, other.bounding_radius()),
        };
        self.insert(Object::Character(Character {
            pose: desc.pose,
            radius,
            half_height,
            layers: desc.layers,
            input: CharacterInput::default(),
            vertical_speed: 0.0,
        }))
    }

    fn destroy(&mut self, handle: NativeHandle) -> Result<(), EngineError> {
        self.objects
            .remove(&handle)
            .ok_or(EngineError::UnknownHandle(handle))?;
        self.probe.lock().destroyed.push(handle);
        Ok(())
    }

    fn set_linear_velocity(&mut self, handle: NativeHandle, v: Vec3) -> Result<(), EngineError> {
        self.body_mut(handle)?.linear_velocity = v;
        Ok(())
    }

    fn set_angular_velocity(
        &mut self,
        handle: NativeHandle,
        w: Vec3,
    ) -> Result<(), EngineError> {
        self.body_mut(handle)?.angular_velocity = w;
        Ok(())
    }

    fn add_force(
        &mut self,
        handle: NativeHandle,
        force: Vec3,
        _at: Option<Vec3>,
    ) -> Result<(), EngineError> {
        self.body_mut(handle)?.force += force;
        Ok(())
    }

    fn add_impulse(
        &mut self,
        handle: NativeHandle,
        impulse: Vec3,
        _at: Option<Vec3>,
    ) -> Result<(), EngineError> {
        let body = self.body_mut(handle)?;
        body.linear_velocity += impulse * body.inv_mass;
        Ok(())
    }

    fn set_gravity(&mut self, gravity: Vec3) -> Result<(), EngineError> {
        if !gravity.is_finite() {
            return Err(EngineError::rejected("gravity must be finite"));
        }
        self.gravity = gravity;
        Ok(())
    }

    fn set_enabled(&mut self, handle: NativeHandle, enabled: bool) -> Result<(), EngineError> {
        match self.object_mut(handle)? {
            Object::Body(b) => b.enabled = enabled,
            Object::Constraint { enabled: e, .. } => *e = enabled,
            _ => return Err(EngineError::rejected(format!("{handle} cannot be disabled"))),
        }
        Ok(())
    }

    fn set_motion_type(
        &mut self,
        handle: NativeHandle,
        motion: MotionType,
    ) -> Result<(), EngineError> {
        let body = self.body_mut(handle)?;
        body.motion = motion;
        if motion == MotionType::Dynamic && body.inv_mass == 0.0 {
            body.inv_mass = 1.0 / body.radius.powi(3).max(1e-3);
        } else if motion != MotionType::Dynamic {
            body.linear_velocity = Vec3::ZERO;
            body.angular_velocity = Vec3::ZERO;
        }
        Ok(())
    }

    fn move_kinematic(
        &mut self,
        handle: NativeHandle,
        target: Pose,
        _dt: f32,
    ) -> Result<(), EngineError> {
        let body = self.body_mut(handle)?;
        if body.motion != MotionType::Kinematic {
            return Err(EngineError::rejected(format!("{handle} is not kinematic")));
        }
        body.kinematic_target = Some(target);
        Ok(())
    }

    fn set_transform(
        &mut self,
        handle: NativeHandle,
        pose: Pose,
        _wake: bool,
    ) -> Result<(), EngineError> {
        match self.object_mut(handle)? {
            Object::Body(b) => b.pose = pose,
            Object::Character(c) => c.pose = pose,
            _ => return Err(EngineError::rejected(format!("{handle} has no pose"))),
        }
        Ok(())
    }

    fn wake(&mut self, handle: NativeHandle) -> Result<(), EngineError> {
        self.object_mut(handle)?;
        self.probe.lock().woken.push(handle);
        Ok(())
    }

    fn set_character_input(
        &mut self,
        handle: NativeHandle,
        input: &CharacterInput,
    ) -> Result<(), EngineError> {
        match self.object_mut(handle)? {
            Object::Character(c) => {
                c.input = *input;
                Ok(())
            }
            _ => Err(EngineError::rejected(format!("{handle} is not a character"))),
        }
    }

    fn update_constraint(
        &mut self,
        handle: NativeHandle,
        update: &ConstraintParams,
    ) -> Result<(), EngineError> {
        match self.object_mut(handle)? {
            Object::Constraint { params, .. } => {
                params.spring = update.spring.or(params.spring);
                params.limits = update.limits.or(params.limits);
                params.motor = update.motor.or(params.motor);
                Ok(())
            }
            _ => Err(EngineError::rejected(format!("{handle} is not a constraint"))),
        }
    }

    fn cast_ray(
        &mut self,
        origin: Vec3,
        direction: Vec3,
        filter: &CastFilter,
    ) -> Result<Vec<BackendHit>, EngineError> {
        if !origin.is_finite() || !direction.is_finite() {
            return Err(EngineError::rejected("ray must be finite"));
        }
        Ok(self.hits(origin, direction, 0.0, filter))
    }

    fn cast_shape(
        &mut self,
        shape: &ShapeDesc,
        start: &Pose,
        direction: Vec3,
        filter: &CastFilter,
    ) -> Result<Vec<BackendHit>, EngineError> {
        validate_shape(shape)?;
        Ok(self.hits(start.position, direction, shape.bounding_radius(), filter))
    }

    fn update_character(&mut self, handle: NativeHandle, dt: f32) -> Result<(), EngineError> {
        let gravity = self.gravity;
        let Object::Character(c) = self.object_mut(handle)? else {
            return Err(EngineError::rejected(format!("{handle} is not a character")));
        };
        let floor = c.half_height + c.radius;
        let grounded = c.pose.position.y <= floor + 1e-4;
        if let Some(speed) = c.input.jump.take().filter(|_| grounded) {
            c.vertical_speed = speed;
        } else if grounded && c.vertical_speed <= 0.0 {
            c.vertical_speed = 0.0;
        } else {
            c.vertical_speed += gravity.y * dt;
        }
        let horizontal = Vec3::new(c.input.velocity.x, 0.0, c.input.velocity.z);
        c.pose.position += horizontal * dt + Vec3::Y * c.vertical_speed * dt;
        if c.pose.position.y < floor {
            c.pose.position.y = floor;
            c.vertical_speed = 0.0;
        }
        Ok(())
    }

    fn step(&mut self, dt: f32) -> Result<(), EngineError> {
        {
            let mut probe = self.probe.lock();
            if probe.fail_steps {
                return Err(EngineError::rejected("step failure injected by probe"));
            }
            probe.steps += 1;
        }
        let gravity = self.gravity;
        for object in self.objects.values_mut() {
            let Object::Body(b) = object else { continue };
            if !b.enabled {
                continue;
            }
            match b.motion {
                MotionType::Static => {}
                MotionType::Kinematic => {
                    if let Some(target) = b.kinematic_target.take() {
                        b.linear_velocity = (target.position - b.pose.position) / dt;
                        b.pose = target;
                    } else {
                        b.linear_velocity = Vec3::ZERO;
                    }
                }
                MotionType::Dynamic => {
                    let accel = gravity * b.gravity_factor + b.force * b.inv_mass;
                    b.linear_velocity += accel * dt;
                    b.linear_velocity *= 1.0 / (1.0 + dt * b.linear_damping);
                    b.pose.position += b.linear_velocity * dt;
                    let spin = Quat::from_scaled_axis(b.angular_velocity * dt);
                    b.pose.rotation = (spin * b.pose.rotation).normalize();
                    b.force = Vec3::ZERO;
                }
            }
        }
        Ok(())
    }

    fn pose(&self, handle: NativeHandle) -> Result<Pose, EngineError> {
        if self.probe.lock().fail_pose.contains(&handle) {
            return Err(EngineError::rejected("pose read failure injected by probe"));
        }
        match self.objects.get(&handle) {
            Some(Object::Body(b)) => Ok(b.pose),
            Some(Object::Character(c)) => Ok(c.pose),
            Some(_) => Err(EngineError::rejected(format!("{handle} has no pose"))),
            None => Err(EngineError::UnknownHandle(handle)),
        }
    }
}
