//! A ball falling past a static floor, simulated on a worker thread.
//!
//! Demonstrates:
//!   1. Spawning an executor thread behind a `WorkerMessenger`
//!   2. Creating bodies through a `Proxy` that owns the scene poses
//!   3. Offering frames at a render rate with one step in flight
//!   4. A ray cast answered alongside the transforms
//!
//! Run with:
//!   cargo run -p tether-engine --example worker_step

use std::time::Duration;

use tether_backend::{PhysicsBackend, RayQuery};
use tether_core::{CorrelationId, Pose, Vec3};
use tether_engine::{DispatchOutcome, ExecutorConfig, Proxy, ProxyState, WorkerMessenger};
use tether_test_utils::{fixtures, TestBackend};

const FRAME: f32 = 1.0 / 144.0;
const WAIT: Duration = Duration::from_secs(1);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let messenger =
        WorkerMessenger::spawn(|| Box::new(TestBackend::new()) as Box<dyn PhysicsBackend>)?;
    let mut proxy: Proxy<Pose, _> = Proxy::new(messenger, ExecutorConfig::default())?;
    while proxy.state() == &ProxyState::AwaitingHandshake {
        proxy.poll_timeout(WAIT)?;
    }
    if let Some(caps) = proxy.capabilities() {
        println!("executor ready: {} (protocol {})", caps.backend, caps.protocol_version);
    }

    let floor = proxy.create_body(
        Pose::from_position(Vec3::new(0.0, -0.5, 0.0)),
        fixtures::anchor(0, Vec3::ZERO),
    );
    let ball = proxy.create_body(
        Pose::from_position(Vec3::new(0.0, 4.0, 0.0)),
        fixtures::falling_sphere(0, Vec3::ZERO),
    );

    let (mut dispatched, mut skipped) = (0, 0);
    for frame in 0..120 {
        if frame % 30 == 0 {
            let mut ray = RayQuery::new(CorrelationId(0), Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y * 20.0);
            ray.ignore = Some(ball);
            let id = proxy.cast_ray(ray);
            println!("frame {frame}: ray {id} queued");
        }
        match proxy.step(FRAME)? {
            DispatchOutcome::Dispatched(_) => dispatched += 1,
            DispatchOutcome::Skipped => skipped += 1,
            DispatchOutcome::NotReady => {}
        }
        proxy.poll()?;
        std::thread::sleep(Duration::from_secs_f32(FRAME));
    }
    while !proxy.can_dispatch() {
        proxy.poll_timeout(WAIT)?;
    }

    if let Some(node) = proxy.node(ball) {
        println!("ball at y = {:.3}", node.position.y);
    }
    for id in 0..4 {
        if let Some(hits) = proxy.take_query(CorrelationId(id)) {
            let on_floor = hits.iter().any(|h| h.index == floor);
            println!("ray {id}: {} hits, floor hit: {on_floor}", hits.len());
        }
    }
    println!(
        "{dispatched} steps dispatched, {skipped} frames coalesced, {} fixed steps run",
        proxy.step_count()
    );

    proxy.shutdown()?;
    Ok(())
}
