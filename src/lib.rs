//! noemoji - session and RPC client for the noemoji operation backend
//!
//! Every interaction with the backend is a single named operation carried in
//! one JSON envelope over a WebSocket:
//!
//! ```text
//!  caller ──► services ──► SessionManager ──► Gateway ──► Transport ──► backend
//!                              │
//!                              └── SessionStore (uid, token)
//! ```
//!
//! The backend is the authority for users, tokens and emoji records. This
//! crate owns credential hashing, the local session pair, and the discipline
//! of validating that pair before any privileged action.

pub mod auth;
pub mod client;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod protocol;
pub mod services;
pub mod session;
pub mod transport;
pub mod types;

pub use client::Client;
pub use config::Args;
pub use gateway::Gateway;
pub use protocol::{Envelope, Op, Reply};
pub use session::{BestEffort, CredentialRotation, Session, SessionManager, SessionStore};
pub use types::{Error, ErrorKind, Result};
