//! Caller-side handle to an executor.
//!
//! The proxy mints indices, encodes commands into an outgoing buffer, and
//! ships that buffer with each step. It never has more than one step in
//! flight: frames that arrive while a result is outstanding are counted
//! and their time is banked, and exactly one coalesced step goes out as
//! soon as the pending result lands.
//!
//! Indices of destroyed objects stay reserved until the result of the
//! batch that destroyed them arrives, so the executor never sees a reused
//! index alias a live object.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::time::Duration;

use tether_backend::{
    BodyDesc, Capabilities, CharacterDesc, Command, ConstraintDesc, DestroyCommand,
    ModifyCommand, QueryHit, RayQuery, ShapeCreate, ShapeDesc, ShapeQuery,
};
use tether_buffer::{BufferConfig, CommandBuffer};
use tether_core::{
    CorrelationId, DispatchError, ExecutorFault, Index, Operator, StepError, PROTOCOL_VERSION,
};
use tether_tracker::IndexAllocator;

use crate::config::{ConfigError, ExecutorConfig};
use crate::hooks::{CallbackCategory, StepHook};
use crate::message::{Request, Response, ResultMessage, StepMessage};
use crate::messenger::{Messenger, MessengerError};
use crate::metrics::StepMetrics;
use crate::report::{read_reports, CommandFailure, FailureKind, Report};
use crate::scene::SceneNode;

// ── Errors ───────────────────────────────────────────────────────

/// Errors surfaced by [`Proxy`].
#[derive(Debug)]
pub enum ProxyError {
    /// The messenger lost its executor.
    Disconnected,
    /// The executor speaks a different protocol version.
    ProtocolMismatch {
        /// Version this proxy encodes.
        expected: u16,
        /// Version the executor reported.
        found: u16,
    },
    /// The executor refused its configuration.
    CreateFailed(ConfigError),
    /// The executor is faulted and will not step.
    Faulted(ExecutorFault),
    /// The executor rejected a request.
    Rejected(StepError),
    /// A results buffer could not be read.
    Malformed(DispatchError),
    /// The executor has been destroyed.
    Destroyed,
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "executor disconnected"),
            Self::ProtocolMismatch { expected, found } => {
                write!(f, "protocol mismatch: expected {expected}, executor has {found}")
            }
            Self::CreateFailed(e) => write!(f, "executor creation failed: {e}"),
            Self::Faulted(fault) => write!(f, "executor faulted: {fault}"),
            Self::Rejected(e) => write!(f, "request rejected: {e}"),
            Self::Malformed(e) => write!(f, "malformed results: {e}"),
            Self::Destroyed => write!(f, "executor destroyed"),
        }
    }
}

impl Error for ProxyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateFailed(e) => Some(e),
            Self::Faulted(e) => Some(e),
            Self::Rejected(e) => Some(e),
            Self::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MessengerError> for ProxyError {
    fn from(_: MessengerError) -> Self {
        Self::Disconnected
    }
}

// ── State ────────────────────────────────────────────────────────

/// Lifecycle of a proxy's executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProxyState {
    /// `CreateExecutor` sent, no `Ready` yet.
    AwaitingHandshake,
    /// Steps may be dispatched.
    Ready,
    /// The executor reported a sticky fault.
    Faulted(ExecutorFault),
    /// The executor is gone.
    Destroyed,
}

/// What [`Proxy::step`] did with a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A step carrying the outgoing batch was sent.
    Dispatched(CorrelationId),
    /// A step is in flight; the frame time was banked.
    Skipped,
    /// The handshake has not completed; the frame time was dropped.
    NotReady,
}

enum Slot<E> {
    Node(E),
    Shape,
    Constraint { a: Index, b: Index },
}

// ── Proxy ────────────────────────────────────────────────────────

/// Caller-side mirror of an executor's world.
///
/// `E` is the scene object each body or character drives; `M` carries
/// requests to wherever the executor runs.
pub struct Proxy<E, M> {
    messenger: M,
    state: ProxyState,
    capabilities: Option<Capabilities>,
    buffer_config: BufferConfig,

    entities: IndexAllocator<Slot<E>>,
    pending_frees: Vec<Index>,
    in_flight_frees: Vec<Index>,

    outgoing: CommandBuffer,
    spare_commands: Option<CommandBuffer>,
    spare_results: Option<CommandBuffer>,

    can_dispatch: bool,
    in_flight: Option<CorrelationId>,
    skipped: u32,
    skipped_dt: f32,
    next_step: CorrelationId,
    next_query: CorrelationId,

    queries: HashMap<CorrelationId, Vec<QueryHit>>,
    failures: Vec<CommandFailure>,
    step_count: u64,
    last_metrics: Option<StepMetrics>,
}

impl<E, M> fmt::Debug for Proxy<E, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("state", &self.state)
            .field("live", &self.entities.len())
            .field("can_dispatch", &self.can_dispatch)
            .field("skipped", &self.skipped)
            .field("step_count", &self.step_count)
            .finish_non_exhaustive()
    }
}

impl<E: SceneNode, M: Messenger> Proxy<E, M> {
    /// Send `CreateExecutor` over `messenger`.
    ///
    /// The proxy starts in [`ProxyState::AwaitingHandshake`]; commands may
    /// be queued right away and go out with the first step after `Ready`.
    pub fn new(mut messenger: M, config: ExecutorConfig) -> Result<Self, ProxyError> {
        let buffer_config = config.buffer;
        messenger.send(Request::CreateExecutor(config))?;
        Ok(Self {
            messenger,
            state: ProxyState::AwaitingHandshake,
            capabilities: None,
            buffer_config,
            entities: IndexAllocator::new(),
            pending_frees: Vec::new(),
            in_flight_frees: Vec::new(),
            outgoing: CommandBuffer::with_config(buffer_config),
            spare_commands: None,
            spare_results: None,
            can_dispatch: false,
            in_flight: None,
            skipped: 0,
            skipped_dt: 0.0,
            next_step: CorrelationId(0),
            next_query: CorrelationId(0),
            queries: HashMap::new(),
            failures: Vec::new(),
            step_count: 0,
            last_metrics: None,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    /// What the executor reported at handshake.
    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    /// Whether the next [`step`](Self::step) would dispatch.
    pub fn can_dispatch(&self) -> bool {
        self.state == ProxyState::Ready && self.can_dispatch
    }

    /// Frames banked while a step is in flight.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Fixed steps the executor reported in its latest result.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Timings from the latest profiled result.
    pub fn last_metrics(&self) -> Option<&StepMetrics> {
        self.last_metrics.as_ref()
    }

    /// Commands queued for the next step.
    pub fn pending_commands(&self) -> u16 {
        self.outgoing.commands_count()
    }

    /// Number of live indices, including destroyed ones awaiting release.
    pub fn live_count(&self) -> usize {
        self.entities.len()
    }

    /// Whether `index` is reserved.
    pub fn contains(&self, index: Index) -> bool {
        self.entities.contains(index)
    }

    /// The scene node driven by `index`.
    pub fn node(&self, index: Index) -> Option<&E> {
        match self.entities.get(index)? {
            Slot::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Mutable scene node driven by `index`.
    pub fn node_mut(&mut self, index: Index) -> Option<&mut E> {
        match self.entities.get_mut(index)? {
            Slot::Node(node) => Some(node),
            _ => None,
        }
    }

    /// The messenger.
    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Queue a body whose pose starts at `node`'s pose.
    pub fn create_body(&mut self, node: E, mut desc: BodyDesc) -> Index {
        desc.pose = node.pose();
        desc.index = self.entities.add(Slot::Node(node));
        desc.write_to(&mut self.outgoing);
        desc.index
    }

    /// Queue a reusable shape.
    pub fn create_shape(&mut self, shape: ShapeDesc) -> Index {
        let index = self.entities.add(Slot::Shape);
        ShapeCreate { index, shape }.write_to(&mut self.outgoing);
        index
    }

    /// Queue a constraint between two bodies.
    ///
    /// Returns `None` without queuing if either body is not live or is
    /// already being destroyed.
    pub fn create_constraint(&mut self, mut desc: ConstraintDesc) -> Option<Index> {
        for body in [desc.body_a, desc.body_b] {
            if !self.is_addressable(body) {
                log::debug!("constraint on {body} dropped: not live");
                return None;
            }
        }
        desc.index = self.entities.add(Slot::Constraint {
            a: desc.body_a,
            b: desc.body_b,
        });
        desc.write_to(&mut self.outgoing);
        Some(desc.index)
    }

    /// Queue a character controller whose pose starts at `node`'s pose.
    pub fn create_character(&mut self, node: E, mut desc: CharacterDesc) -> Index {
        desc.pose = node.pose();
        desc.index = self.entities.add(Slot::Node(node));
        desc.write_to(&mut self.outgoing);
        desc.index
    }

    /// Queue a modification. Returns `false` without queuing if the
    /// target is not live.
    pub fn modify(&mut self, cmd: &ModifyCommand) -> bool {
        if let Some(target) = cmd.target() {
            if !self.is_addressable(target) {
                log::debug!("modify of {target} dropped: not live");
                return false;
            }
        }
        cmd.write_to(&mut self.outgoing);
        true
    }

    /// Queue a ray cast. Hits are available from
    /// [`take_query`](Self::take_query) once the step's result arrives.
    pub fn cast_ray(&mut self, mut query: RayQuery) -> CorrelationId {
        query.correlation = self.next_query_id();
        query.write_to(&mut self.outgoing);
        query.correlation
    }

    /// Queue a shape cast.
    pub fn cast_shape(&mut self, mut query: ShapeQuery) -> CorrelationId {
        query.correlation = self.next_query_id();
        query.write_to(&mut self.outgoing);
        query.correlation
    }

    /// Queue destruction of `index` and every constraint attached to it.
    ///
    /// Returns `false` if the index is not live or already being
    /// destroyed.
    pub fn destroy(&mut self, index: Index) -> bool {
        if !self.is_addressable(index) {
            return false;
        }
        DestroyCommand { index }.write_to(&mut self.outgoing);
        let attached: Vec<Index> = self
            .entities
            .iter()
            .filter_map(|(i, slot)| match slot {
                Slot::Constraint { a, b } if *a == index || *b == index => Some(i),
                _ => None,
            })
            .filter(|i| self.is_addressable(*i))
            .collect();
        self.pending_frees.push(index);
        self.pending_frees.extend(attached);
        true
    }

    /// Replace executor hooks. Only honoured before the first step.
    pub fn override_callbacks(
        &mut self,
        category: CallbackCategory,
        hooks: Vec<Box<dyn StepHook>>,
    ) -> Result<(), ProxyError> {
        self.send(Request::OverrideCallbacks { category, hooks })
    }

    // ── Stepping ─────────────────────────────────────────────────

    /// Offer one frame of `dt` seconds to the executor.
    pub fn step(&mut self, dt: f32) -> Result<DispatchOutcome, ProxyError> {
        match &self.state {
            ProxyState::Ready => {}
            ProxyState::AwaitingHandshake => return Ok(DispatchOutcome::NotReady),
            ProxyState::Faulted(fault) => return Err(ProxyError::Faulted(fault.clone())),
            ProxyState::Destroyed => return Err(ProxyError::Destroyed),
        }
        if !self.can_dispatch {
            self.skipped += 1;
            self.skipped_dt += dt;
            log::trace!("frame skipped: {} banked, {}s", self.skipped, self.skipped_dt);
            return Ok(DispatchOutcome::Skipped);
        }
        self.dispatch(dt).map(DispatchOutcome::Dispatched)
    }

    /// Apply every response that has already arrived.
    ///
    /// Returns the number of step results applied.
    pub fn poll(&mut self) -> Result<usize, ProxyError> {
        let mut applied = 0;
        while let Some(response) = self.messenger.try_recv()? {
            applied += self.handle(response)?;
        }
        Ok(applied)
    }

    /// Wait up to `timeout` for a response, then apply everything queued.
    pub fn poll_timeout(&mut self, timeout: Duration) -> Result<usize, ProxyError> {
        match self.messenger.recv_timeout(timeout)? {
            Some(response) => {
                let applied = self.handle(response)?;
                Ok(applied + self.poll()?)
            }
            None => Ok(0),
        }
    }

    /// Hits for a query, once its step result has been applied.
    pub fn take_query(&mut self, id: CorrelationId) -> Option<Vec<QueryHit>> {
        self.queries.remove(&id)
    }

    /// Failed commands reported since the last drain.
    pub fn drain_failures(&mut self) -> Vec<CommandFailure> {
        std::mem::take(&mut self.failures)
    }

    /// Destroy the executor. Further steps return [`ProxyError::Destroyed`].
    pub fn shutdown(&mut self) -> Result<(), ProxyError> {
        if self.state == ProxyState::Destroyed {
            return Ok(());
        }
        self.state = ProxyState::Destroyed;
        self.can_dispatch = false;
        self.messenger.send(Request::Destroy)?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    fn is_addressable(&self, index: Index) -> bool {
        self.entities.contains(index)
            && !self.pending_frees.contains(&index)
            && !self.in_flight_frees.contains(&index)
    }

    /// Free the index of a create the executor never tracked.
    ///
    /// `IndexInUse` means the executor still holds that index for another
    /// object, so it stays reserved. Constraints queued on the index fail
    /// with their own reports and are released then.
    fn release_failed_create(&mut self, failure: &CommandFailure) {
        if failure.operator != Operator::Create || failure.kind == FailureKind::IndexInUse {
            return;
        }
        let Some(index) = failure.target else {
            return;
        };
        if !self.entities.contains(index) {
            return;
        }
        self.pending_frees.retain(|i| *i != index);
        self.entities.free(index);
    }

    fn next_query_id(&mut self) -> CorrelationId {
        let id = self.next_query;
        self.next_query = id.next();
        id
    }

    fn send(&mut self, request: Request) -> Result<(), ProxyError> {
        self.messenger.send(request).map_err(|e| {
            log::error!("{e}");
            self.state = ProxyState::Destroyed;
            self.can_dispatch = false;
            ProxyError::from(e)
        })
    }

    fn dispatch(&mut self, dt: f32) -> Result<CorrelationId, ProxyError> {
        let id = self.next_step;
        self.next_step = id.next();

        let fresh = self
            .spare_commands
            .take()
            .unwrap_or_else(|| CommandBuffer::with_config(self.buffer_config));
        let buffer = std::mem::replace(&mut self.outgoing, fresh);
        log::trace!("step {id}: {} commands, dt {dt}", buffer.commands_count());

        // A copying transport hands back clones; only reuse moved buffers.
        let recycled = if self.messenger.is_zero_copy() {
            self.spare_results.take()
        } else {
            None
        };
        self.send(Request::Step(StepMessage {
            buffer,
            dt,
            correlation_id: id,
            recycled,
        }))?;
        self.in_flight_frees.append(&mut self.pending_frees);
        self.in_flight = Some(id);
        self.can_dispatch = false;
        Ok(id)
    }

    fn handle(&mut self, response: Response) -> Result<usize, ProxyError> {
        match response {
            Response::Ready(caps) => {
                if caps.protocol_version != PROTOCOL_VERSION {
                    log::error!(
                        "executor protocol {} does not match {PROTOCOL_VERSION}",
                        caps.protocol_version
                    );
                    let found = caps.protocol_version;
                    self.shutdown()?;
                    return Err(ProxyError::ProtocolMismatch {
                        expected: PROTOCOL_VERSION,
                        found,
                    });
                }
                log::info!("executor ready: {}", caps.backend);
                self.capabilities = Some(caps);
                self.state = ProxyState::Ready;
                self.can_dispatch = true;
                Ok(0)
            }
            Response::CreateFailed(e) => {
                self.state = ProxyState::Destroyed;
                Err(ProxyError::CreateFailed(e))
            }
            Response::Result(msg) => {
                self.apply_result(msg)?;
                Ok(1)
            }
            Response::Rejected(e) => {
                log::warn!("executor rejected request: {e}");
                if matches!(e, StepError::NotCreated | StepError::Destroyed) {
                    self.state = ProxyState::Destroyed;
                    self.can_dispatch = false;
                }
                Err(ProxyError::Rejected(e))
            }
            Response::Destroyed => {
                log::debug!("executor destroyed");
                self.state = ProxyState::Destroyed;
                self.can_dispatch = false;
                Ok(0)
            }
        }
    }

    fn apply_result(&mut self, mut msg: ResultMessage) -> Result<(), ProxyError> {
        if self.in_flight != Some(msg.correlation_id) {
            log::warn!(
                "result {} does not match in-flight step {:?}",
                msg.correlation_id,
                self.in_flight
            );
        }
        self.in_flight = None;
        self.can_dispatch = true;
        self.step_count = msg.step_count;
        if msg.metrics.is_some() {
            self.last_metrics = msg.metrics.take();
        }
        if self.messenger.is_zero_copy() {
            self.spare_commands = msg.recycled.take();
        }
        for index in self.in_flight_frees.drain(..) {
            self.entities.free(index);
        }

        let reports = read_reports(&mut msg.buffer);
        if self.messenger.is_zero_copy() {
            self.spare_results = Some(msg.buffer);
        }
        for report in reports.map_err(ProxyError::Malformed)? {
            match report {
                Report::Transforms(poses) => {
                    for (index, pose) in poses {
                        if let Some(Slot::Node(node)) = self.entities.get_mut(index) {
                            node.apply_pose(&pose);
                        }
                    }
                }
                Report::QueryHits { correlation, hits } => {
                    self.queries.insert(correlation, hits);
                }
                Report::CommandFailed(failure) => {
                    log::debug!("command {} failed: {:?}", failure.ordinal, failure.kind);
                    self.release_failed_create(&failure);
                    self.failures.push(failure);
                }
            }
        }

        if let Some(fault) = msg.fault {
            log::error!("executor faulted: {fault}");
            self.state = ProxyState::Faulted(fault.clone());
            self.can_dispatch = false;
            return Err(ProxyError::Faulted(fault));
        }

        if self.skipped > 0 {
            let dt = std::mem::take(&mut self.skipped_dt);
            log::trace!("{} skipped frames coalesced into one step", self.skipped);
            self.skipped = 0;
            self.dispatch(dt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::inline::InlineMessenger;
    use tether_backend::PhysicsBackend;
    use tether_core::{Pose, Vec3};
    use tether_test_utils::{fixtures, BackendProbe, TestBackend};

    const STEP: f32 = 1.0 / 60.0;

    /// Inline messenger that records the dt of every step it forwards.
    struct Counting {
        inner: InlineMessenger,
        steps: Vec<f32>,
    }

    impl Messenger for Counting {
        fn send(&mut self, request: Request) -> Result<(), MessengerError> {
            if let Request::Step(msg) = &request {
                self.steps.push(msg.dt);
            }
            self.inner.send(request)
        }

        fn try_recv(&mut self) -> Result<Option<Response>, MessengerError> {
            self.inner.try_recv()
        }

        fn recv_timeout(&mut self, t: Duration) -> Result<Option<Response>, MessengerError> {
            self.inner.recv_timeout(t)
        }

        fn is_zero_copy(&self) -> bool {
            true
        }
    }

    fn counting() -> (Counting, BackendProbe) {
        let backend = TestBackend::new();
        let probe = backend.probe();
        let mut slot = Some(backend);
        let inner = InlineMessenger::new(move || {
            Box::new(slot.take().unwrap_or_else(TestBackend::new)) as Box<dyn PhysicsBackend>
        });
        (
            Counting {
                inner,
                steps: Vec::new(),
            },
            probe,
        )
    }

    fn ready() -> (Proxy<Pose, Counting>, BackendProbe) {
        let (messenger, probe) = counting();
        let mut proxy = Proxy::new(messenger, ExecutorConfig::default()).unwrap();
        proxy.poll().unwrap();
        assert_eq!(proxy.state(), &ProxyState::Ready);
        (proxy, probe)
    }

    #[test]
    fn handshake_gates_dispatch() {
        let (messenger, _) = counting();
        let mut proxy: Proxy<Pose, _> = Proxy::new(messenger, ExecutorConfig::default()).unwrap();
        assert_eq!(proxy.state(), &ProxyState::AwaitingHandshake);
        assert_eq!(proxy.step(STEP).unwrap(), DispatchOutcome::NotReady);
        assert!(proxy.messenger().steps.is_empty());

        proxy.poll().unwrap();
        assert_eq!(
            proxy.capabilities().unwrap().protocol_version,
            PROTOCOL_VERSION
        );
        assert!(matches!(
            proxy.step(STEP).unwrap(),
            DispatchOutcome::Dispatched(_)
        ));
    }

    #[test]
    fn one_step_in_flight_and_one_coalesced_catch_up() {
        let (mut proxy, _) = ready();
        assert!(matches!(
            proxy.step(STEP).unwrap(),
            DispatchOutcome::Dispatched(_)
        ));
        assert_eq!(proxy.step(STEP).unwrap(), DispatchOutcome::Skipped);
        assert_eq!(proxy.step(STEP).unwrap(), DispatchOutcome::Skipped);
        assert_eq!(proxy.skipped(), 2);
        assert_eq!(proxy.messenger().steps.len(), 1);

        proxy.poll().unwrap();
        let steps = &proxy.messenger().steps;
        assert_eq!(steps.len(), 2);
        assert!((steps[1] - 2.0 * STEP).abs() < 1e-6);
        assert_eq!(proxy.skipped(), 0);

        proxy.poll().unwrap();
        assert_eq!(proxy.messenger().steps.len(), 2);
        assert!(proxy.can_dispatch());
    }

    #[test]
    fn transforms_reach_the_scene_node() {
        let (mut proxy, _) = ready();
        let body = proxy.create_body(
            Pose::from_position(Vec3::new(0.0, 1.0, 0.0)),
            fixtures::falling_sphere(0, Vec3::ZERO),
        );
        proxy.step(1.5 * STEP).unwrap();
        assert_eq!(proxy.poll().unwrap(), 1);

        let y = proxy.node(body).unwrap().position.y;
        assert!(y < 1.0, "body did not fall: {y}");
        assert_eq!(proxy.step_count(), 1);
    }

    #[test]
    fn destroyed_index_is_held_until_the_result() {
        let (mut proxy, _) = ready();
        let a = proxy.create_body(Pose::IDENTITY, fixtures::anchor(0, Vec3::ZERO));
        let b = proxy.create_body(Pose::IDENTITY, fixtures::falling_sphere(0, Vec3::ZERO));
        let joint = proxy
            .create_constraint(fixtures::ball_joint(0, a.0, b.0))
            .unwrap();
        proxy.step(STEP).unwrap();
        proxy.poll().unwrap();

        assert!(proxy.destroy(b));
        assert!(!proxy.destroy(b));
        assert!(!proxy.destroy(joint));
        assert!(proxy.contains(b) && proxy.contains(joint));

        proxy.step(STEP).unwrap();
        assert!(proxy.contains(b));
        proxy.poll().unwrap();
        assert!(!proxy.contains(b));
        assert!(!proxy.contains(joint));
        assert!(proxy.contains(a));
        assert!(proxy.drain_failures().is_empty());
    }

    #[test]
    fn query_hits_are_keyed_by_correlation() {
        let (mut proxy, _) = ready();
        let ground = proxy.create_body(Pose::IDENTITY, fixtures::anchor(0, Vec3::ZERO));
        let id = proxy.cast_ray(RayQuery::new(
            CorrelationId(0),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::NEG_Y * 10.0,
        ));
        proxy.step(STEP).unwrap();
        proxy.poll().unwrap();

        let hits = proxy.take_query(id).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, ground);
        assert!(proxy.take_query(id).is_none());
    }

    #[test]
    fn failed_create_releases_its_index() {
        let (mut proxy, _) = ready();
        proxy.create_body(Pose::IDENTITY, fixtures::anchor(0, Vec3::ZERO));
        let bad = proxy.create_shape(ShapeDesc::Sphere { radius: -1.0 });
        assert_eq!(proxy.live_count(), 2);
        proxy.step(STEP).unwrap();
        proxy.poll().unwrap();

        let failures = proxy.drain_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].ordinal, 1);
        assert_eq!(failures[0].operator, Operator::Create);
        assert_eq!(failures[0].target, Some(bad));
        assert_eq!(failures[0].kind, FailureKind::Rejected);
        assert!(!proxy.contains(bad));
        assert_eq!(proxy.live_count(), 1);

        let sphere = proxy.create_shape(ShapeDesc::Sphere { radius: 1.0 });
        assert_eq!(sphere, bad);
        proxy.step(STEP).unwrap();
        proxy.poll().unwrap();
        assert!(proxy.drain_failures().is_empty());
        assert!(proxy.contains(sphere));
    }

    #[test]
    fn constraint_on_a_dying_body_is_refused() {
        let (mut proxy, _) = ready();
        let a = proxy.create_body(Pose::IDENTITY, fixtures::anchor(0, Vec3::ZERO));
        let b = proxy.create_body(Pose::IDENTITY, fixtures::falling_sphere(0, Vec3::Y));
        proxy.step(STEP).unwrap();
        proxy.poll().unwrap();

        assert!(proxy.destroy(b));
        assert!(proxy
            .create_constraint(fixtures::ball_joint(0, a.0, b.0))
            .is_none());
        assert!(proxy
            .create_constraint(fixtures::ball_joint(0, a.0, 99))
            .is_none());
        assert_eq!(proxy.pending_commands(), 1);

        proxy.step(STEP).unwrap();
        proxy.poll().unwrap();
        assert!(proxy.drain_failures().is_empty());
        assert_eq!(proxy.live_count(), 1);
        assert!(proxy.contains(a));
    }

    #[test]
    fn fault_stops_stepping() {
        let (mut proxy, probe) = ready();
        probe.fail_steps(true);
        proxy.step(1.5 * STEP).unwrap();
        assert!(matches!(proxy.poll(), Err(ProxyError::Faulted(_))));
        assert!(matches!(proxy.state(), ProxyState::Faulted(_)));
        assert!(matches!(proxy.step(STEP), Err(ProxyError::Faulted(_))));
    }

    /// Messenger that answers `CreateExecutor` with a canned handshake.
    struct Scripted(VecDeque<Response>);

    impl Messenger for Scripted {
        fn send(&mut self, request: Request) -> Result<(), MessengerError> {
            if let Request::CreateExecutor(_) = request {
                self.0.push_back(Response::Ready(Capabilities {
                    protocol_version: PROTOCOL_VERSION + 1,
                    backend: "scripted".into(),
                    max_bodies: None,
                    shape_casts: false,
                    characters: false,
                }));
            }
            Ok(())
        }

        fn try_recv(&mut self) -> Result<Option<Response>, MessengerError> {
            Ok(self.0.pop_front())
        }

        fn recv_timeout(&mut self, _: Duration) -> Result<Option<Response>, MessengerError> {
            self.try_recv()
        }

        fn is_zero_copy(&self) -> bool {
            false
        }
    }

    #[test]
    fn protocol_mismatch_is_fatal() {
        let mut proxy: Proxy<Pose, _> =
            Proxy::new(Scripted(VecDeque::new()), ExecutorConfig::default()).unwrap();
        match proxy.poll() {
            Err(ProxyError::ProtocolMismatch { expected, found }) => {
                assert_eq!(expected, PROTOCOL_VERSION);
                assert_eq!(found, PROTOCOL_VERSION + 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(proxy.state(), &ProxyState::Destroyed);
        assert!(matches!(proxy.step(STEP), Err(ProxyError::Destroyed)));
    }
}
