//! Principal (user) records as exchanged with the backend

use serde::{Deserialize, Serialize};

/// A user record as returned by `user.query`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    /// Stable user identifier
    pub uid: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub tel: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Elevated-privilege flag
    #[serde(rename = "super", default)]
    pub is_super: bool,

    /// Credential digest (`hex(salt):hex(key)`)
    pub pwh: String,
}

/// A principal as shown to callers: everything but the credential digest
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PrincipalInfo {
    pub uid: String,
    pub name: String,
    pub tel: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "super")]
    pub is_super: bool,
}

impl From<Principal> for PrincipalInfo {
    fn from(p: Principal) -> Self {
        Self {
            uid: p.uid,
            name: p.name,
            tel: p.tel,
            email: p.email,
            is_super: p.is_super,
        }
    }
}

/// Public profile fields supplied at registration
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Profile {
    pub uid: String,
    pub name: String,
    pub tel: Option<String>,
    pub email: Option<String>,
}

/// Payload of a `user.mod` operation
///
/// Only `uid` is required. Absent fields are left out of the envelope so the
/// backend keeps their stored values.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PrincipalUpdate {
    pub uid: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// `Some(None)` sends an explicit `null`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tel: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,

    #[serde(rename = "super", skip_serializing_if = "Option::is_none")]
    pub is_super: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pwh: Option<String>,
}

impl PrincipalUpdate {
    /// Update that touches nothing but the given uid
    pub fn for_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Default::default()
        }
    }

    /// Full record for a freshly registered, unprivileged principal
    pub fn registration(profile: Profile, pwh: String) -> Self {
        Self {
            uid: profile.uid,
            name: Some(profile.name),
            tel: Some(profile.tel),
            email: Some(profile.email),
            is_super: Some(false),
            pwh: Some(pwh),
        }
    }

    pub fn with_pwh(mut self, pwh: String) -> Self {
        self.pwh = Some(pwh);
        self
    }
}

/// Full record, as the stored principal currently stands
impl From<Principal> for PrincipalUpdate {
    fn from(p: Principal) -> Self {
        Self {
            uid: p.uid,
            name: Some(p.name),
            tel: Some(p.tel),
            email: Some(p.email),
            is_super: Some(p.is_super),
            pwh: Some(p.pwh),
        }
    }
}
