//! Integration test: full batches through the executor and the proxy.
//!
//! Covers the paths a caller actually exercises: a body created, stepped
//! and reported; cascading destruction observed at the backend; frames
//! applied strictly in append order; and the same world driven through
//! an inline proxy.

use tether_backend::{
    BodyDesc, CharacterDesc, Command, ConstraintDesc, DestroyCommand, ModifyCommand, Payload,
    PhysicsBackend, RayQuery, ShapeCreate, ShapeQuery,
};
use tether_buffer::CommandBuffer;
use tether_core::{
    CleanupOp, CorrelationId, CreateOp, DispatchError, Index, ModifyOp, Operator, Pose, QueryOp,
    Vec3,
};
use tether_engine::report::read_reports;
use tether_engine::{
    DispatchOutcome, Executor, ExecutorConfig, InlineMessenger, Proxy, Report, StepMessage,
};
use tether_test_utils::{fixtures, TestBackend};

const STEP: f32 = 1.0 / 60.0;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn executor() -> (Executor, tether_test_utils::BackendProbe) {
    let backend = TestBackend::new();
    let probe = backend.probe();
    let executor = Executor::new(ExecutorConfig::default(), Box::new(backend)).unwrap();
    (executor, probe)
}

fn run(executor: &mut Executor, buffer: CommandBuffer, dt: f32) -> Vec<Report> {
    let mut result = executor.step(StepMessage {
        buffer,
        dt,
        correlation_id: CorrelationId(0),
        recycled: None,
    });
    assert!(result.fault.is_none(), "unexpected fault: {:?}", result.fault);
    read_reports(&mut result.buffer).unwrap()
}

fn transforms(reports: &[Report]) -> Vec<(Index, Pose)> {
    reports
        .iter()
        .find_map(|r| match r {
            Report::Transforms(poses) => Some(poses.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

// ── Schema walker ────────────────────────────────────────────────

/// Decode every frame in `buf` and return its (operator, opcode) pair.
fn walk(buf: &mut CommandBuffer) -> Result<Vec<(Operator, u16)>, DispatchError> {
    buf.rewind();
    let mut frames = Vec::new();
    for _ in 0..buf.commands_count() {
        let offset = buf.read_offset();
        let tag = buf.read_operator();
        let opcode = buf.read_command();
        let operator =
            Operator::from_wire(tag).ok_or(DispatchError::UnknownOperator { tag, offset })?;
        let unknown = DispatchError::UnknownOpcode {
            operator: tag,
            opcode,
        };
        match operator {
            Operator::Create => match CreateOp::from_wire(opcode).ok_or(unknown)? {
                CreateOp::Body => {
                    BodyDesc::decode(buf)?;
                }
                CreateOp::Shape => {
                    ShapeCreate::decode(buf)?;
                }
                CreateOp::Constraint => {
                    ConstraintDesc::decode(buf)?;
                }
                CreateOp::Character => {
                    CharacterDesc::decode(buf)?;
                }
            },
            Operator::Modify => {
                let op = ModifyOp::from_wire(opcode).ok_or(unknown)?;
                ModifyCommand::decode(op, buf)?;
            }
            Operator::Query => match QueryOp::from_wire(opcode).ok_or(unknown)? {
                QueryOp::Ray => {
                    RayQuery::decode(buf)?;
                }
                QueryOp::Shape => {
                    ShapeQuery::decode(buf)?;
                }
            },
            Operator::Cleanup => {
                let CleanupOp::Destroy = CleanupOp::from_wire(opcode).ok_or(unknown)?;
                DestroyCommand::decode(buf)?;
            }
            Operator::Report => return Err(DispatchError::UnknownOperator { tag, offset }),
        }
        frames.push((operator, opcode));
    }
    assert!(!buf.overran());
    assert_eq!(buf.remaining(), 0);
    Ok(frames)
}

// ── Tests ────────────────────────────────────────────────────────

#[test]
fn created_body_falls_and_is_reported() {
    init_logging();
    let (mut executor, _) = executor();
    let mut buf = CommandBuffer::new();
    fixtures::falling_sphere(7, Vec3::new(0.0, 1.0, 0.0)).write_to(&mut buf);

    let reports = run(&mut executor, buf, 1.5 * STEP);
    let poses = transforms(&reports);
    assert_eq!(poses.len(), 1);
    assert_eq!(poses[0].0, Index(7));
    assert!(poses[0].1.position.y < 1.0);
}

#[test]
fn destroying_the_middle_of_a_chain_cascades() {
    init_logging();
    let (mut executor, probe) = executor();
    let (bodies, joints) = fixtures::chain();
    let mut buf = CommandBuffer::new();
    bodies.iter().for_each(|b| b.write_to(&mut buf));
    joints.iter().for_each(|j| j.write_to(&mut buf));
    run(&mut executor, buf, STEP);
    assert_eq!(probe.created(), 5);

    let mut buf = CommandBuffer::new();
    DestroyCommand { index: Index(1) }.write_to(&mut buf);
    let reports = run(&mut executor, buf, STEP);

    assert_eq!(probe.destroyed().len(), 3);
    assert_eq!(probe.woken().len(), 2);
    let reported: Vec<Index> = transforms(&reports).iter().map(|(i, _)| *i).collect();
    assert_eq!(reported, vec![Index(0), Index(2)]);
    let tracker = executor.tracker();
    assert!(!tracker.contains(Index(1)));
    assert!(!tracker.contains(Index(10)));
    assert!(!tracker.contains(Index(11)));
}

#[test]
fn frames_apply_in_append_order() {
    init_logging();
    let (mut executor, _) = executor();
    let mut buf = CommandBuffer::new();
    fixtures::falling_sphere(0, Vec3::new(0.0, 5.0, 0.0)).write_to(&mut buf);
    ModifyCommand::SetTransform {
        index: Index(0),
        pose: Pose::from_position(Vec3::new(0.0, 20.0, 0.0)),
        wake: true,
    }
    .write_to(&mut buf);
    DestroyCommand { index: Index(0) }.write_to(&mut buf);
    fixtures::falling_sphere(0, Vec3::new(0.0, -3.0, 0.0)).write_to(&mut buf);

    let frames = walk(&mut buf).unwrap();
    assert_eq!(
        frames,
        vec![
            (Operator::Create, CreateOp::Body.to_wire()),
            (Operator::Modify, ModifyOp::SetTransform.to_wire()),
            (Operator::Cleanup, CleanupOp::Destroy.to_wire()),
            (Operator::Create, CreateOp::Body.to_wire()),
        ]
    );

    let reports = run(&mut executor, buf, 1.5 * STEP);
    assert!(!reports
        .iter()
        .any(|r| matches!(r, Report::CommandFailed(_))));
    let poses = transforms(&reports);
    assert_eq!(poses.len(), 1);
    let y = poses[0].1.position.y;
    assert!(y < -3.0 && y > -4.0, "unexpected height {y}");
}

#[test]
fn proxy_drives_an_inline_executor() {
    init_logging();
    let messenger = InlineMessenger::new(|| Box::new(TestBackend::new()) as Box<dyn PhysicsBackend>);
    let mut proxy: Proxy<Pose, _> = Proxy::new(messenger, ExecutorConfig::default()).unwrap();
    proxy.poll().unwrap();

    let ball = proxy.create_body(
        Pose::from_position(Vec3::new(0.0, 10.0, 0.0)),
        BodyDesc::new(Index(0), tether_backend::ShapeDesc::Sphere { radius: 0.5 }, Vec3::ZERO),
    );
    let mut last = 10.0;
    for _ in 0..5 {
        assert!(matches!(
            proxy.step(1.5 * STEP).unwrap(),
            DispatchOutcome::Dispatched(_)
        ));
        assert_eq!(proxy.poll().unwrap(), 1);
        let y = proxy.node(ball).unwrap().position.y;
        assert!(y < last, "{y} did not fall below {last}");
        last = y;
    }
    assert!(proxy.step_count() >= 5);
    proxy.shutdown().unwrap();
    proxy.poll().unwrap();
}
