//! Same-thread messenger.

use std::collections::VecDeque;
use std::time::Duration;

use tether_backend::PhysicsBackend;

use crate::message::{Request, Response};
use crate::messenger::{ExecutorHost, Messenger, MessengerError};

/// Runs the executor synchronously inside [`send`](Messenger::send).
///
/// Responses are queued and handed out by the next receive call, so the
/// caller sees the same asynchronous shape as with a worker thread.
#[derive(Debug)]
pub struct InlineMessenger {
    host: ExecutorHost,
    responses: VecDeque<Response>,
}

impl InlineMessenger {
    /// Messenger whose executor builds its backend with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: FnMut() -> Box<dyn PhysicsBackend> + Send + 'static,
    {
        Self {
            host: ExecutorHost::new(factory),
            responses: VecDeque::new(),
        }
    }

    /// The host driving the executor.
    pub fn host(&self) -> &ExecutorHost {
        &self.host
    }

    /// Responses produced but not yet received.
    pub fn pending(&self) -> usize {
        self.responses.len()
    }
}

impl Messenger for InlineMessenger {
    fn send(&mut self, request: Request) -> Result<(), MessengerError> {
        if let Some(response) = self.host.handle(request) {
            self.responses.push_back(response);
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Response>, MessengerError> {
        Ok(self.responses.pop_front())
    }

    // Nothing arrives later than `send`, so waiting is pointless.
    fn recv_timeout(&mut self, _timeout: Duration) -> Result<Option<Response>, MessengerError> {
        self.try_recv()
    }

    fn is_zero_copy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use tether_test_utils::TestBackend;

    #[test]
    fn responses_wait_for_receive() {
        let mut m = InlineMessenger::new(|| Box::new(TestBackend::new()) as Box<dyn PhysicsBackend>);
        m.send(Request::CreateExecutor(ExecutorConfig::default()))
            .unwrap();
        assert_eq!(m.pending(), 1);
        assert!(m.host().executor().is_some());
        assert!(matches!(m.try_recv(), Ok(Some(Response::Ready(_)))));
        assert!(matches!(m.try_recv(), Ok(None)));
    }
}
