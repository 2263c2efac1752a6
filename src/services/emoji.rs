//! Emoji actions

use std::sync::Arc;

use tracing::{info, warn};

use super::{authenticated_principal, ensure_admin};
use crate::session::SessionManager;
use crate::types::{EmojiRecord, Error, Result};

pub struct EmojiService {
    sessions: Arc<SessionManager>,
}

impl EmojiService {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Record `emoji` for the logged-in principal
    pub async fn submit(&self, emoji: i64) -> Result<()> {
        if emoji < 0 {
            return Err(Error::rejected("unknown emoji"));
        }

        let session = self.sessions.require_session().await?;

        if !self
            .sessions
            .gateway()
            .insert_emoji(&session.uid, emoji)
            .await?
        {
            warn!(uid = %session.uid, emoji, "Emoji submission refused by backend");
            return Err(Error::rejected("emoji submission failed"));
        }

        info!(uid = %session.uid, emoji, "Emoji submitted");
        Ok(())
    }

    /// The logged-in principal's submissions, newest first
    pub async fn history(&self) -> Result<Vec<EmojiRecord>> {
        let session = self.sessions.require_session().await?;
        let records = self
            .sessions
            .gateway()
            .query_emojis(Some(&session.uid))
            .await?;
        Ok(newest_first(records))
    }

    /// Everyone's submissions, newest first; administrators only
    pub async fn global_history(&self) -> Result<Vec<EmojiRecord>> {
        let (_, principal) = authenticated_principal(&self.sessions).await?;
        ensure_admin(&principal)?;

        let records = self.sessions.gateway().query_emojis(None).await?;
        Ok(newest_first(records))
    }
}

fn newest_first(mut records: Vec<EmojiRecord>) -> Vec<EmojiRecord> {
    records.sort_by(|a, b| b.time.cmp(&a.time));
    records
}
