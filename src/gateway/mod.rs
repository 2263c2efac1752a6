//! Operation gateway
//!
//! Every backend action passes through [`Gateway::call`]: the operation name
//! and its fields become one [`Envelope`], the transport carries it, and the
//! [`Reply`] comes back undecided. The gateway attaches no meaning to a falsy
//! reply; that is the caller's call. Typed wrappers for the known operations
//! live in `ops`.
//!
//! Nothing here retries.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::protocol::{Envelope, Reply};
use crate::transport::{Transport, WsTransport, WsTransportConfig};
use crate::types::{Error, Result};

mod ops;

/// Typed front door to the backend
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Gateway over the default per-call WebSocket transport
    pub fn websocket(config: WsTransportConfig) -> Self {
        Self::new(Arc::new(WsTransport::new(config)))
    }

    /// Send `op` with `fields` merged flat into the envelope.
    ///
    /// The reply may be structured JSON or raw text.
    pub async fn call<F: Serialize + ?Sized>(&self, op: &str, fields: &F) -> Result<Reply> {
        let envelope = Envelope::with_fields(op, fields)?;
        self.send(&envelope).await
    }

    /// Like [`call`](Self::call) but decodes the reply into `T`.
    ///
    /// A raw payload is `Error::Backend`; a JSON shape mismatch is `Error::Decode`.
    pub async fn call_as<T, F>(&self, op: &str, fields: &F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Serialize + ?Sized,
    {
        self.call(op, fields).await?.decode()
    }

    /// Like [`call`](Self::call), abandoned as soon as `cancel` completes.
    ///
    /// Abandoning drops the in-flight connection.
    pub async fn call_until<F, C>(&self, op: &str, fields: &F, cancel: C) -> Result<Reply>
    where
        F: Serialize + ?Sized,
        C: Future<Output = ()>,
    {
        let envelope = Envelope::with_fields(op, fields)?;

        tokio::select! {
            reply = self.send(&envelope) => reply,
            _ = cancel => {
                debug!(op = %op, "Operation cancelled by caller");
                Err(Error::Cancelled)
            }
        }
    }

    async fn send(&self, envelope: &Envelope) -> Result<Reply> {
        let reply = self.transport.send(envelope).await?;
        debug!(
            op = %envelope.op(),
            raw = reply.is_raw(),
            truthy = reply.is_truthy(),
            "Operation replied"
        );
        Ok(reply)
    }
}
