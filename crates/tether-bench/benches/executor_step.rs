//! Criterion benchmarks for routing and stepping through the executor.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tether_backend::Command;
use tether_bench::{body_grid, frame_churn, mixed_batch};
use tether_buffer::CommandBuffer;
use tether_core::CorrelationId;
use tether_engine::{Executor, ExecutorConfig, StepMessage};
use tether_test_utils::TestBackend;

const STEP: f32 = 1.0 / 60.0;

fn executor_with(n: u32) -> Executor {
    let mut executor =
        Executor::new(ExecutorConfig::default(), Box::new(TestBackend::new())).unwrap();
    let mut buf = CommandBuffer::new();
    for body in body_grid(n) {
        body.write_to(&mut buf);
    }
    let result = executor.step(StepMessage {
        buffer: buf,
        dt: STEP,
        correlation_id: CorrelationId(0),
        recycled: None,
    });
    assert!(result.fault.is_none());
    executor
}

/// Benchmark: route a full creation batch of 1K bodies into a fresh world.
fn bench_create_world_1k(c: &mut Criterion) {
    let bodies = body_grid(1_000);

    c.bench_function("create_world_1k", |b| {
        b.iter_batched(
            || {
                let mut buf = CommandBuffer::new();
                mixed_batch(&mut buf, &bodies);
                let executor =
                    Executor::new(ExecutorConfig::default(), Box::new(TestBackend::new()))
                        .unwrap();
                (executor, buf)
            },
            |(mut executor, buffer)| {
                black_box(executor.step(StepMessage {
                    buffer,
                    dt: STEP,
                    correlation_id: CorrelationId(1),
                    recycled: None,
                }))
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: one frame of 1K velocity updates plus a fixed step.
fn bench_steady_frame_1k(c: &mut Criterion) {
    let mut executor = executor_with(1_000);
    let mut commands = Some(CommandBuffer::new());
    let mut results = None;
    let mut id = CorrelationId(1);

    c.bench_function("steady_frame_1k", |b| {
        b.iter(|| {
            let mut buffer = commands.take().unwrap_or_default();
            frame_churn(&mut buffer, 1_000);
            let result = executor.step(StepMessage {
                buffer,
                dt: STEP,
                correlation_id: id,
                recycled: results.take(),
            });
            id = id.next();
            commands = result.recycled;
            results = Some(black_box(result.buffer));
        });
    });
}

criterion_group!(benches, bench_create_world_1k, bench_steady_frame_1k);
criterion_main!(benches);
