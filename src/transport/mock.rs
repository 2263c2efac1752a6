//! Scripted in-memory transport for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::Transport;
use crate::protocol::{Envelope, Reply};
use crate::types::{Error, Result};

type Handler = Box<dyn Fn(&Envelope) -> Result<Reply> + Send + Sync>;

/// Transport that answers each operation from a registered handler and
/// records every envelope it was given.
///
/// Operations without a handler fail with a transport error.
#[derive(Default)]
pub struct MockTransport {
    handlers: HashMap<String, Handler>,
    sent: Mutex<Vec<Envelope>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `op` with whatever `handler` returns.
    pub fn on<H>(mut self, op: impl Into<String>, handler: H) -> Self
    where
        H: Fn(&Envelope) -> Result<Reply> + Send + Sync + 'static,
    {
        self.handlers.insert(op.into(), Box::new(handler));
        self
    }

    /// Always answer `op` with `reply`.
    pub fn reply(self, op: impl Into<String>, reply: Reply) -> Self {
        self.on(op, move |_| Ok(reply.clone()))
    }

    /// Always fail `op` with a transport error.
    pub fn fail(self, op: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        self.on(op, move |_| Err(Error::Transport(message.clone())))
    }

    /// Every envelope sent so far, in order
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Operation names sent so far, in order
    pub fn ops(&self) -> Vec<String> {
        self.sent().iter().map(|e| e.op().to_string()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, envelope: &Envelope) -> Result<Reply> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(envelope.clone());
        }

        match self.handlers.get(envelope.op()) {
            Some(handler) => handler(envelope),
            None => Err(Error::Transport(format!(
                "no handler for operation '{}'",
                envelope.op()
            ))),
        }
    }
}
