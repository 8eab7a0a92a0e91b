//! Transport between the proxy and the executor.
//!
//! A [`Messenger`] carries [`Request`]s one way and [`Response`]s back.
//! Neither direction blocks the caller: [`try_recv`](Messenger::try_recv)
//! returns immediately, and [`recv_timeout`](Messenger::recv_timeout)
//! exists only for callers that choose to wait.
//!
//! Both transports drive the same [`ExecutorHost`], so an executor behaves
//! identically whether it runs inline or on a worker thread.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use tether_backend::PhysicsBackend;

use crate::executor::Executor;
use crate::message::{Request, Response};

/// Builds a fresh backend each time an executor is created.
pub type BackendFactory = Box<dyn FnMut() -> Box<dyn PhysicsBackend> + Send>;

/// The transport is gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessengerError {
    /// The other side hung up.
    Disconnected,
}

impl fmt::Display for MessengerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "executor side disconnected"),
        }
    }
}

impl Error for MessengerError {}

/// Moves requests to an executor and responses back.
pub trait Messenger {
    /// Deliver a request. Never blocks.
    fn send(&mut self, request: Request) -> Result<(), MessengerError>;

    /// Next response, if one is ready.
    fn try_recv(&mut self) -> Result<Option<Response>, MessengerError>;

    /// Next response, waiting up to `timeout` for one.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Response>, MessengerError>;

    /// Whether buffers cross without being copied.
    fn is_zero_copy(&self) -> bool;
}

/// Owns an executor and answers requests for it.
pub struct ExecutorHost {
    factory: BackendFactory,
    executor: Option<Executor>,
}

impl fmt::Debug for ExecutorHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHost")
            .field("created", &self.executor.is_some())
            .finish()
    }
}

impl ExecutorHost {
    /// Host that builds its backend with `factory` on `CreateExecutor`.
    pub fn new<F>(factory: F) -> Self
    where
        F: FnMut() -> Box<dyn PhysicsBackend> + Send + 'static,
    {
        Self {
            factory: Box::new(factory),
            executor: None,
        }
    }

    /// The hosted executor, once created.
    pub fn executor(&self) -> Option<&Executor> {
        self.executor.as_ref()
    }

    /// Apply one request. Returns the response to send back, if any.
    ///
    /// Successful callback overrides are silent; every other request
    /// gets exactly one response.
    pub fn handle(&mut self, request: Request) -> Option<Response> {
        match request {
            Request::CreateExecutor(config) => {
                if self.executor.is_some() {
                    log::warn!("executor recreated; previous world dropped");
                }
                match Executor::new(config, (self.factory)()) {
                    Ok(executor) => {
                        let caps = executor.capabilities();
                        self.executor = Some(executor);
                        Some(Response::Ready(caps))
                    }
                    Err(e) => {
                        log::error!("executor creation failed: {e}");
                        self.executor = None;
                        Some(Response::CreateFailed(e))
                    }
                }
            }
            Request::OverrideCallbacks { category, hooks } => {
                let Some(executor) = self.executor.as_mut() else {
                    return Some(Response::Rejected(tether_core::StepError::NotCreated));
                };
                executor
                    .override_callbacks(category, hooks)
                    .err()
                    .map(Response::Rejected)
            }
            Request::Step(msg) => match self.executor.as_mut() {
                Some(executor) => Some(Response::Result(executor.step(msg))),
                None => {
                    log::warn!("step {} before executor creation", msg.correlation_id);
                    Some(Response::Rejected(tether_core::StepError::NotCreated))
                }
            },
            Request::Destroy => {
                self.executor = None;
                Some(Response::Destroyed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_buffer::CommandBuffer;
    use tether_core::{CorrelationId, StepError};
    use tether_test_utils::TestBackend;

    use crate::config::ExecutorConfig;
    use crate::hooks::CallbackCategory;
    use crate::message::StepMessage;

    fn host() -> ExecutorHost {
        ExecutorHost::new(|| Box::new(TestBackend::new()) as Box<dyn PhysicsBackend>)
    }

    fn step() -> Request {
        Request::Step(StepMessage {
            buffer: CommandBuffer::new(),
            dt: 1.0 / 60.0,
            correlation_id: CorrelationId(0),
            recycled: None,
        })
    }

    #[test]
    fn step_before_create_is_rejected() {
        let mut host = host();
        assert!(matches!(
            host.handle(step()),
            Some(Response::Rejected(StepError::NotCreated))
        ));
    }

    #[test]
    fn lifecycle() {
        let mut host = host();
        assert!(matches!(
            host.handle(Request::CreateExecutor(ExecutorConfig::default())),
            Some(Response::Ready(_))
        ));
        assert!(host
            .handle(Request::OverrideCallbacks {
                category: CallbackCategory::PreStep,
                hooks: Vec::new(),
            })
            .is_none());
        assert!(matches!(host.handle(step()), Some(Response::Result(_))));
        assert!(matches!(
            host.handle(Request::OverrideCallbacks {
                category: CallbackCategory::PreStep,
                hooks: Vec::new(),
            }),
            Some(Response::Rejected(StepError::CallbacksLocked))
        ));
        assert!(matches!(
            host.handle(Request::Destroy),
            Some(Response::Destroyed)
        ));
        assert!(host.executor().is_none());
    }

    #[test]
    fn invalid_config_is_reported() {
        let mut host = host();
        let config = ExecutorConfig {
            fixed_step: -1.0,
            ..ExecutorConfig::default()
        };
        assert!(matches!(
            host.handle(Request::CreateExecutor(config)),
            Some(Response::CreateFailed(_))
        ));
    }
}
