//! Messenger that runs the executor on a dedicated thread.
//!
//! ```text
//! Caller thread                      Executor thread
//!     |                                   |
//!     |--send(Request)------------------->| req_rx.recv()
//!     |   [req_tx: unbounded]             | host.handle(request)
//!     |<--try_recv()----------------------| resp_tx.send(response)
//!     |   [resp_rx: unbounded]            |
//! ```
//!
//! Both channels are unbounded: the proxy never has more than one step
//! in flight, so queue depth is bounded by the protocol, not the channel.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tether_backend::PhysicsBackend;

use crate::config::ConfigError;
use crate::message::{Request, Response};
use crate::messenger::{ExecutorHost, Messenger, MessengerError};

/// Name given to the executor thread.
pub const THREAD_NAME: &str = "tether-executor";

/// Runs an [`ExecutorHost`] on a background thread.
///
/// Dropping the messenger destroys the executor and joins the thread.
#[derive(Debug)]
pub struct WorkerMessenger {
    req_tx: Option<Sender<Request>>,
    resp_rx: Receiver<Response>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerMessenger {
    /// Spawn the executor thread. The backend is built on that thread.
    pub fn spawn<F>(factory: F) -> Result<Self, ConfigError>
    where
        F: FnMut() -> Box<dyn PhysicsBackend> + Send + 'static,
    {
        let (req_tx, req_rx) = crossbeam_channel::unbounded();
        let (resp_tx, resp_rx) = crossbeam_channel::unbounded();
        let host = ExecutorHost::new(factory);

        let thread = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || serve(host, req_rx, resp_tx))
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: format!("{THREAD_NAME}: {e}"),
            })?;

        Ok(Self {
            req_tx: Some(req_tx),
            resp_rx,
            thread: Some(thread),
        })
    }

    /// Destroy the executor and wait for its thread to exit.
    ///
    /// Returns `false` if the thread panicked. Idempotent.
    pub fn shutdown(&mut self) -> bool {
        if let Some(tx) = self.req_tx.take() {
            // The thread may already be gone; the join below reports that.
            let _ = tx.send(Request::Destroy);
        }
        match self.thread.take() {
            Some(handle) => match handle.join() {
                Ok(()) => true,
                Err(_) => {
                    log::error!("{THREAD_NAME} thread panicked");
                    false
                }
            },
            None => true,
        }
    }
}

fn serve(mut host: ExecutorHost, requests: Receiver<Request>, responses: Sender<Response>) {
    log::debug!("{THREAD_NAME} started");
    while let Ok(request) = requests.recv() {
        if let Some(response) = host.handle(request) {
            if responses.send(response).is_err() {
                log::debug!("response receiver dropped; stopping");
                break;
            }
        }
    }
    log::debug!("{THREAD_NAME} stopped");
}

impl Messenger for WorkerMessenger {
    fn send(&mut self, request: Request) -> Result<(), MessengerError> {
        let tx = self.req_tx.as_ref().ok_or(MessengerError::Disconnected)?;
        tx.send(request).map_err(|_| MessengerError::Disconnected)
    }

    fn try_recv(&mut self) -> Result<Option<Response>, MessengerError> {
        match self.resp_rx.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(MessengerError::Disconnected),
        }
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Response>, MessengerError> {
        match self.resp_rx.recv_timeout(timeout) {
            Ok(response) => Ok(Some(response)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(MessengerError::Disconnected),
        }
    }

    fn is_zero_copy(&self) -> bool {
        true
    }
}

impl Drop for WorkerMessenger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use tether_test_utils::TestBackend;

    const WAIT: Duration = Duration::from_secs(5);

    fn spawn() -> WorkerMessenger {
        WorkerMessenger::spawn(|| Box::new(TestBackend::new()) as Box<dyn PhysicsBackend>).unwrap()
    }

    #[test]
    fn create_then_destroy() {
        let mut m = spawn();
        m.send(Request::CreateExecutor(ExecutorConfig::default()))
            .unwrap();
        assert!(matches!(m.recv_timeout(WAIT), Ok(Some(Response::Ready(_)))));
        m.send(Request::Destroy).unwrap();
        assert!(matches!(m.recv_timeout(WAIT), Ok(Some(Response::Destroyed))));
        assert!(m.shutdown());
    }

    #[test]
    fn send_after_shutdown_fails() {
        let mut m = spawn();
        assert!(m.shutdown());
        assert!(m.shutdown());
        assert_eq!(
            m.send(Request::Destroy).unwrap_err(),
            MessengerError::Disconnected
        );
    }
}
