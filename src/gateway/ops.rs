//! Typed wrappers for the backend's operation catalogue

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::Gateway;
use crate::protocol::{Op, Reply};
use crate::types::{EmojiRecord, Principal, PrincipalUpdate, Result};

/// Optional `uid` filter shared by the query operations
#[derive(Serialize)]
struct UidFilter<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    uid: Option<&'a str>,
}

impl Gateway {
    /// `user.query` for one uid; `None` when the backend knows no such user
    pub async fn query_user(&self, uid: &str) -> Result<Option<Principal>> {
        let reply = self
            .call(Op::UserQuery.as_str(), &UidFilter { uid: Some(uid) })
            .await?;

        if let Reply::Json(ref value) = reply {
            if !reply.is_truthy() {
                debug!(uid = %uid, reply = %value, "User not found");
                return Ok(None);
            }
        }

        reply.decode().map(Some)
    }

    /// `user.query` without a uid: every principal
    pub async fn list_users(&self) -> Result<Vec<Principal>> {
        self.call_as(Op::UserQuery.as_str(), &UidFilter { uid: None })
            .await
    }

    /// `user.mod`: create or update a principal; `true` on success
    pub async fn modify_user(&self, update: &PrincipalUpdate) -> Result<bool> {
        self.call(Op::UserMod.as_str(), update).await?.truthy_json()
    }

    /// `user.mktoken`: issue a fresh session token for `uid`
    pub async fn mint_token(&self, uid: &str) -> Result<String> {
        self.call_as(Op::UserMkToken.as_str(), &json!({ "uid": uid }))
            .await
    }

    /// `user.validate`: whether `token` is a live session for `uid`
    pub async fn validate_token(&self, uid: &str, token: &str) -> Result<bool> {
        self.call(Op::UserValidate.as_str(), &json!({ "uid": uid, "token": token }))
            .await?
            .truthy_json()
    }

    /// `user.rmtoken`: revoke `token`. The reply carries no information.
    pub async fn revoke_token(&self, token: &str) -> Result<()> {
        let reply = self
            .call(Op::UserRmToken.as_str(), &json!({ "token": token }))
            .await?;
        if let Reply::Raw(text) = reply {
            debug!(reply = %text, "Ignoring raw reply to token revocation");
        }
        Ok(())
    }

    /// `emoji.insert`: record that `uid` picked `emoji`
    pub async fn insert_emoji(&self, uid: &str, emoji: i64) -> Result<bool> {
        self.call(Op::EmojiInsert.as_str(), &json!({ "uid": uid, "emoji": emoji }))
            .await?
            .truthy_json()
    }

    /// `emoji.query`: submissions of `uid`, or of everyone when `None`
    pub async fn query_emojis(&self, uid: Option<&str>) -> Result<Vec<EmojiRecord>> {
        self.call_as(Op::EmojiQuery.as_str(), &UidFilter { uid }).await
    }
}
