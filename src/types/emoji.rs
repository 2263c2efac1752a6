//! Emoji submission records

use serde::{Deserialize, Serialize};

/// One submitted emoji as returned by `emoji.query`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EmojiRecord {
    /// Emoji identifier chosen by the user
    pub emoji: i64,

    /// Submission time (unix seconds)
    pub time: i64,

    /// Submitter; only present when querying across all users
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}
