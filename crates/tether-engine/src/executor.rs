//! The executor: owns the backend and runs one batch per step.
//!
//! An [`Executor`] is an explicit value. Whoever hosts it (the same
//! thread through [`InlineMessenger`](crate::InlineMessenger), or a
//! worker thread through [`WorkerMessenger`](crate::WorkerMessenger))
//! passes it every [`StepMessage`] and forwards the [`ResultMessage`].
//!
//! Faults are sticky. A desynchronized command stream or a failed
//! backend step leaves the world in an unknown state, so every later step
//! is refused until [`clear_fault`](Executor::clear_fault) is called.

use std::time::Instant;

use tether_backend::{Capabilities, PhysicsBackend};
use tether_buffer::CommandBuffer;
use tether_core::{ExecutorFault, StepError, WarnOnce};
use tether_tracker::Tracker;

use crate::config::{ConfigError, ExecutorConfig};
use crate::hooks::{CallbackCategory, Hooks, StepHook};
use crate::message::{ResultMessage, StepMessage};
use crate::metrics::StepMetrics;
use crate::report::write_transforms;
use crate::router::{route_batch, RouteContext};
use crate::stepper::Stepper;

/// Routes command batches into a physics backend and reports results.
pub struct Executor {
    config: ExecutorConfig,
    backend: Box<dyn PhysicsBackend>,
    tracker: Tracker,
    stepper: Stepper,
    hooks: Hooks,
    warnings: WarnOnce,
    fault: Option<ExecutorFault>,
    started: bool,
    last_metrics: StepMetrics,
    spare: Option<CommandBuffer>,
}

impl Executor {
    /// Validate `config` and take ownership of `backend`.
    pub fn new(
        config: ExecutorConfig,
        mut backend: Box<dyn PhysicsBackend>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Err(e) = backend.set_gravity(config.gravity) {
            log::warn!("backend refused initial gravity {}: {e}", config.gravity);
        }
        let caps = backend.capabilities();
        log::debug!(
            "executor up on '{}' (protocol {}), fixed step {}s",
            caps.backend,
            caps.protocol_version,
            config.fixed_step
        );
        Ok(Self {
            stepper: Stepper::new(config.fixed_step, config.max_sub_steps, config.interpolate),
            config,
            backend,
            tracker: Tracker::new(),
            hooks: Hooks::default(),
            warnings: WarnOnce::new(),
            fault: None,
            started: false,
            last_metrics: StepMetrics::default(),
            spare: None,
        })
    }

    /// Backend handshake constants.
    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    /// Configuration the executor was built with.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Live objects by index.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// The sticky fault, if any.
    pub fn fault(&self) -> Option<&ExecutorFault> {
        self.fault.as_ref()
    }

    /// Metrics from the most recent step.
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.last_metrics
    }

    /// Replace the hooks of `category`.
    ///
    /// Refused with [`StepError::CallbacksLocked`] once the first step has
    /// run.
    pub fn override_callbacks(
        &mut self,
        category: CallbackCategory,
        hooks: Vec<Box<dyn StepHook>>,
    ) -> Result<(), StepError> {
        if self.started {
            return Err(StepError::CallbacksLocked);
        }
        log::debug!("{} {category:?} hooks registered", hooks.len());
        self.hooks.set(category, hooks);
        Ok(())
    }

    /// Forget the sticky fault so stepping can resume.
    pub fn clear_fault(&mut self) {
        if let Some(fault) = self.fault.take() {
            log::info!("clearing executor fault: {fault}");
        }
    }

    /// Route `msg`'s batch, advance time, and report.
    ///
    /// A faulted executor neither routes nor steps; it returns an empty
    /// results buffer carrying the fault.
    pub fn step(&mut self, msg: StepMessage) -> ResultMessage {
        let StepMessage {
            buffer: mut commands,
            dt,
            correlation_id,
            recycled,
        } = msg;
        let mut results = recycled
            .or_else(|| self.spare.take())
            .unwrap_or_else(|| CommandBuffer::with_config(self.config.buffer));
        results.reset();

        if self.fault.is_none() {
            self.started = true;
            self.run(&mut commands, &mut results, dt);
        } else {
            log::debug!("step {correlation_id} refused: executor faulted");
        }

        commands.reset();
        let profile = self.config.profile;
        ResultMessage {
            buffer: results,
            step_count: self.stepper.total_steps(),
            perf_id: profile.then_some(correlation_id.0),
            correlation_id,
            recycled: Some(commands),
            fault: self.fault.clone(),
            metrics: profile.then(|| self.last_metrics.clone()),
        }
    }

    fn run(&mut self, commands: &mut CommandBuffer, results: &mut CommandBuffer, dt: f32) {
        let started = Instant::now();
        let mut metrics = StepMetrics::default();

        let routed = {
            let mut ctx = RouteContext {
                backend: self.backend.as_mut(),
                tracker: &mut self.tracker,
                results: &mut *results,
                warnings: &mut self.warnings,
                fixed_step: self.config.fixed_step,
                interpolate: self.config.interpolate,
            };
            route_batch(commands, &mut ctx)
        };
        metrics.command_us = started.elapsed().as_micros() as u64;

        match routed {
            Ok(stats) => {
                metrics.commands_applied = stats.applied;
                metrics.commands_failed = stats.failed;
                metrics.stale_handles = stats.skipped;
            }
            Err(e) => {
                log::error!("command stream desync, executor faulted: {e}");
                self.fault = Some(ExecutorFault::Desync(e));
                metrics.total_us = started.elapsed().as_micros() as u64;
                self.last_metrics = metrics;
                return;
            }
        }

        let physics = Instant::now();
        let advanced = self.stepper.advance(
            dt,
            self.backend.as_mut(),
            &mut self.tracker,
            &mut self.hooks,
            &mut self.warnings,
        );
        metrics.physics_us = physics.elapsed().as_micros() as u64;

        match advanced {
            Ok(advance) => {
                metrics.sub_steps = advance.sub_steps;
                metrics.pose_read_failures = advance.pose_failures;
                metrics.dropped_time = advance.dropped_time;
                let report = Instant::now();
                write_transforms(results, &self.tracker);
                metrics.interpolation_us = report.elapsed().as_micros() as u64;
            }
            Err(e) => {
                log::error!("physics step failed, executor faulted: {e}");
                self.fault = Some(ExecutorFault::EngineStep(e));
            }
        }

        if results.lost_writes() > 0 {
            self.warnings.warn(
                "executor.results",
                format_args!("{} result writes dropped", results.lost_writes()),
            );
        }
        metrics.total_us = started.elapsed().as_micros() as u64;
        self.last_metrics = metrics;
    }

    /// Keep a results buffer for the next step that arrives without one.
    pub fn return_buffer(&mut self, buffer: CommandBuffer) {
        self.spare = Some(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_backend::{Command, DestroyCommand, ModifyCommand, RayQuery};
    use tether_core::{CorrelationId, DispatchError, EngineError, Index, Operator, Vec3};
    use tether_test_utils::{fixtures, TestBackend};

    use crate::hooks::HookContext;
    use crate::report::{read_reports, Report};

    const STEP: f32 = 1.0 / 60.0;

    fn executor(config: ExecutorConfig) -> (Executor, tether_test_utils::BackendProbe) {
        let backend = TestBackend::new();
        let probe = backend.probe();
        (Executor::new(config, Box::new(backend)).unwrap(), probe)
    }

    fn step(exec: &mut Executor, buffer: CommandBuffer, dt: f32) -> ResultMessage {
        exec.step(StepMessage {
            buffer,
            dt,
            correlation_id: CorrelationId(1),
            recycled: None,
        })
    }

    fn transforms(result: &mut ResultMessage) -> Vec<(Index, tether_core::Pose)> {
        read_reports(&mut result.buffer)
            .unwrap()
            .into_iter()
            .find_map(|r| match r {
                Report::Transforms(t) => Some(t),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = ExecutorConfig {
            fixed_step: 0.0,
            ..ExecutorConfig::default()
        };
        assert!(Executor::new(config, Box::new(TestBackend::new())).is_err());
    }

    #[test]
    fn body_falls_under_gravity() {
        let (mut exec, probe) = executor(ExecutorConfig::default());
        let mut buf = CommandBuffer::new();
        fixtures::falling_sphere(7, Vec3::Y).write_to(&mut buf);

        let mut result = step(&mut exec, buf, STEP * 1.5);
        assert_eq!(result.step_count, 1);
        assert_eq!(probe.steps(), 1);
        let t = transforms(&mut result);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].0, Index(7));
        assert!(t[0].1.position.y < 1.0);
    }

    #[test]
    fn command_buffer_comes_back_reset() {
        let (mut exec, _) = executor(ExecutorConfig::default());
        let mut buf = CommandBuffer::new();
        fixtures::falling_sphere(0, Vec3::Y).write_to(&mut buf);
        let result = step(&mut exec, buf, STEP);

        let recycled = result.recycled.unwrap();
        assert!(recycled.is_empty());
        assert!(!recycled.is_dirty());
        assert!(result.metrics.is_none());
        assert!(result.perf_id.is_none());
    }

    #[test]
    fn desync_faults_until_cleared() {
        let (mut exec, probe) = executor(ExecutorConfig::default());
        let mut buf = CommandBuffer::new();
        buf.write_frame(Operator::Cleanup as u8, 42);
        let result = step(&mut exec, buf, STEP);
        assert_eq!(
            result.fault,
            Some(ExecutorFault::Desync(DispatchError::UnknownOpcode {
                operator: Operator::Cleanup as u8,
                opcode: 42,
            }))
        );
        assert_eq!(probe.steps(), 0);

        let mut buf = CommandBuffer::new();
        fixtures::falling_sphere(0, Vec3::Y).write_to(&mut buf);
        let result = step(&mut exec, buf, STEP);
        assert!(result.fault.is_some());
        assert!(exec.tracker().is_empty());
        assert_eq!(result.buffer.commands_count(), 0);

        exec.clear_fault();
        let result = step(&mut exec, CommandBuffer::new(), STEP);
        assert!(result.fault.is_none());
        assert_eq!(probe.steps(), 1);
    }

    #[test]
    fn backend_step_failure_is_sticky() {
        let (mut exec, probe) = executor(ExecutorConfig::default());
        probe.fail_steps(true);
        let result = step(&mut exec, CommandBuffer::new(), STEP);
        assert!(matches!(
            result.fault,
            Some(ExecutorFault::EngineStep(EngineError::Rejected { .. }))
        ));
        probe.fail_steps(false);
        let result = step(&mut exec, CommandBuffer::new(), STEP);
        assert!(result.fault.is_some());
        assert_eq!(probe.steps(), 0);
    }

    #[test]
    fn results_hold_failures_queries_then_transforms() {
        let (mut exec, _) = executor(ExecutorConfig::default());
        let mut buf = CommandBuffer::new();
        fixtures::anchor(0, Vec3::ZERO).write_to(&mut buf);
        fixtures::falling_sphere(1, Vec3::new(5.0, 5.0, 0.0)).write_to(&mut buf);
        ModifyCommand::MoveKinematic {
            index: Index(1),
            target: tether_core::Pose::IDENTITY,
        }
        .write_to(&mut buf);
        RayQuery::new(CorrelationId(9), Vec3::new(0.0, 3.0, 0.0), Vec3::NEG_Y * 5.0)
            .write_to(&mut buf);
        DestroyCommand { index: Index(0) }.write_to(&mut buf);

        let mut result = step(&mut exec, buf, STEP);
        let reports = read_reports(&mut result.buffer).unwrap();
        assert_eq!(reports.len(), 3);
        assert!(matches!(reports[0], Report::CommandFailed(f) if f.ordinal == 2));
        assert!(matches!(
            &reports[1],
            Report::QueryHits { correlation, hits } if correlation.0 == 9 && hits[0].index == Index(0)
        ));
        assert!(matches!(&reports[2], Report::Transforms(t) if t.len() == 1));
    }

    #[test]
    fn callbacks_lock_after_first_step() {
        let (mut exec, _) = executor(ExecutorConfig::default());
        let hook: Box<dyn StepHook> = Box::new(|_: &mut HookContext<'_>| Ok(()));
        assert_eq!(
            exec.override_callbacks(CallbackCategory::PostStep, vec![hook]),
            Ok(())
        );
        step(&mut exec, CommandBuffer::new(), STEP);
        assert_eq!(
            exec.override_callbacks(CallbackCategory::PreStep, Vec::new()),
            Err(StepError::CallbacksLocked)
        );
    }

    #[test]
    fn pre_step_hook_sees_every_sub_step() {
        let (mut exec, _) = executor(ExecutorConfig::default());
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        let hook: Box<dyn StepHook> = Box::new(move |ctx: &mut HookContext<'_>| {
            sink.lock().unwrap().push(ctx.sub_step);
            Ok(())
        });
        exec.override_callbacks(CallbackCategory::PreStep, vec![hook]).unwrap();
        step(&mut exec, CommandBuffer::new(), STEP * 3.2);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn profiling_attaches_metrics() {
        let (mut exec, _) = executor(ExecutorConfig {
            profile: true,
            ..ExecutorConfig::default()
        });
        let mut buf = CommandBuffer::new();
        fixtures::falling_sphere(0, Vec3::Y).write_to(&mut buf);
        ModifyCommand::LinearVelocity {
            index: Index(5),
            velocity: Vec3::X,
        }
        .write_to(&mut buf);
        let result = exec.step(StepMessage {
            buffer: buf,
            dt: STEP * 2.0,
            correlation_id: CorrelationId(33),
            recycled: None,
        });

        assert_eq!(result.perf_id, Some(33));
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.commands_applied, 1);
        assert_eq!(metrics.stale_handles, 1);
        assert_eq!(metrics.sub_steps, 2);
        assert_eq!(&metrics, exec.last_metrics());
    }

    #[test]
    fn recycled_results_buffer_is_reused() {
        let (mut exec, _) = executor(ExecutorConfig::default());
        let mut spare = CommandBuffer::new();
        spare.write(123u32);
        let result = exec.step(StepMessage {
            buffer: CommandBuffer::new(),
            dt: STEP,
            correlation_id: CorrelationId(2),
            recycled: Some(spare),
        });
        let mut buffer = result.buffer;
        let reports = read_reports(&mut buffer).unwrap();
        assert_eq!(reports, vec![Report::Transforms(vec![])]);

        exec.return_buffer(buffer);
        let result = step(&mut exec, CommandBuffer::new(), STEP);
        assert_eq!(result.buffer.commands_count(), 1);
    }
}
