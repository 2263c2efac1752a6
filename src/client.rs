//! Client context
//!
//! Wires a gateway and a session store into the caller-facing services.
//! One `Client` corresponds to one logged-in identity at a time.

use std::sync::Arc;

use crate::config::Args;
use crate::gateway::Gateway;
use crate::services::{AccountService, EmojiService};
use crate::session::{FileSessionStore, SessionManager, SessionStore};

pub struct Client {
    pub accounts: AccountService,
    pub emoji: EmojiService,
}

impl Client {
    pub fn new(gateway: Gateway, store: Arc<dyn SessionStore>) -> Self {
        let sessions = Arc::new(SessionManager::new(gateway, store));
        Self {
            accounts: AccountService::new(sessions.clone()),
            emoji: EmojiService::new(sessions),
        }
    }

    /// WebSocket gateway and file-backed session, as configured
    pub fn from_args(args: &Args) -> Self {
        let gateway = Gateway::websocket(args.transport_config());
        let store = Arc::new(FileSessionStore::new(args.session_path()));
        Self::new(gateway, store)
    }
}
