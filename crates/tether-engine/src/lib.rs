//! Executor and caller-side proxy for the Tether physics protocol.
//!
//! The [`Executor`] owns a [`PhysicsBackend`](tether_backend::PhysicsBackend)
//! and a [`Tracker`](tether_tracker::Tracker). Each step it routes one
//! batch of commands, advances the fixed-step [`Stepper`], and writes
//! transforms and query hits into a results buffer. The [`Proxy`] runs
//! in the caller's context: it frames commands, keeps at most one step in
//! flight through a [`Messenger`], and applies results to scene nodes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod executor;
pub mod hooks;
pub mod inline;
pub mod message;
pub mod messenger;
pub mod metrics;
pub mod proxy;
pub mod report;
pub mod router;
pub mod scene;
pub mod stepper;
pub mod worker;

pub use config::{ConfigError, ExecutorConfig};
pub use executor::Executor;
pub use hooks::{CallbackCategory, HookContext, StepHook};
pub use inline::InlineMessenger;
pub use message::{Request, Response, ResultMessage, StepMessage};
pub use messenger::{ExecutorHost, Messenger, MessengerError};
pub use metrics::StepMetrics;
pub use proxy::{DispatchOutcome, Proxy, ProxyError, ProxyState};
pub use report::{CommandFailure, FailureKind, Report};
pub use scene::SceneNode;
pub use stepper::{Advance, Stepper};
pub use worker::WorkerMessenger;
