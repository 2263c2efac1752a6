//! Transport layer
//!
//! Single responsibility: deliver one [`Envelope`] to the backend and hand
//! back the one [`Reply`] it produces. No knowledge of operations, sessions,
//! or credentials.
//!
//! The default [`WsTransport`] opens a fresh WebSocket per call. Anything that
//! can honour the same one-request/one-reply contract (a pooled or multiplexed
//! connection, an in-memory fake) can stand in for it behind [`Transport`].

use async_trait::async_trait;

use crate::protocol::{Envelope, Reply};
use crate::types::Result;

mod mock;
mod websocket;

pub use mock::MockTransport;
pub use websocket::{WsTransport, WsTransportConfig};

/// One request, one reply.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `envelope` and wait for the single reply.
    ///
    /// Connection-level failures are `Error::Transport`/`Error::Timeout`,
    /// never a falsy reply.
    async fn send(&self, envelope: &Envelope) -> Result<Reply>;
}
