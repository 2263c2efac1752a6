//! Caller-facing actions
//!
//! Each action is one short conversation with the backend, gated by the
//! session manager where it touches anything privileged.
//!
//! - **Account**: register, login, logout, profile, password, user listing
//! - **Emoji**: submit an emoji, read one's own or everyone's history

mod account;
mod emoji;

pub use account::{AccountService, ProfileChanges};
pub use emoji::EmojiService;

use crate::session::{Session, SessionManager};
use crate::types::{Error, Principal, Result};

/// Validate the session and load the principal it belongs to.
async fn authenticated_principal(sessions: &SessionManager) -> Result<(Session, Principal)> {
    let session = sessions.require_session().await?;
    let principal = sessions
        .gateway()
        .query_user(&session.uid)
        .await?
        .ok_or_else(|| Error::rejected("user does not exist"))?;
    Ok((session, principal))
}

fn ensure_admin(principal: &Principal) -> Result<()> {
    if principal.is_super {
        Ok(())
    } else {
        Err(Error::rejected("administrator privileges required"))
    }
}
