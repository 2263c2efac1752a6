//! Account actions

use std::sync::Arc;

use tracing::{info, warn};

use super::{authenticated_principal, ensure_admin};
use crate::auth::hash_password_async;
use crate::session::{BestEffort, CredentialRotation, Session, SessionManager};
use crate::types::{Error, PrincipalInfo, PrincipalUpdate, Profile, Result};

/// Requested profile edits
///
/// `None` leaves a field alone. For `tel` and `email` an empty string clears
/// the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub tel: Option<String>,
    pub email: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.tel.is_none() && self.email.is_none()
    }
}

pub struct AccountService {
    sessions: Arc<SessionManager>,
}

impl AccountService {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Create a new, unprivileged principal.
    ///
    /// Refuses to overwrite an existing uid.
    pub async fn register(&self, profile: Profile, secret: &str) -> Result<()> {
        if profile.uid.trim().is_empty() || profile.name.trim().is_empty() {
            return Err(Error::rejected("uid and name are required"));
        }
        if secret.is_empty() {
            return Err(Error::rejected("password is required"));
        }

        let gateway = self.sessions.gateway();
        if gateway.query_user(&profile.uid).await?.is_some() {
            info!(uid = %profile.uid, "Registration rejected: uid taken");
            return Err(Error::rejected("user already exists"));
        }

        let uid = profile.uid.clone();
        let pwh = hash_password_async(secret.to_string()).await?;

        if !gateway
            .modify_user(&PrincipalUpdate::registration(profile, pwh))
            .await?
        {
            warn!(uid = %uid, "Registration refused by backend");
            return Err(Error::rejected("registration failed"));
        }

        info!(uid = %uid, "Registered");
        Ok(())
    }

    pub async fn login(&self, uid: &str, secret: &str) -> Result<Session> {
        self.sessions.login(uid, secret).await
    }

    pub async fn logout(&self) -> BestEffort<()> {
        self.sessions.logout().await
    }

    /// The logged-in principal
    pub async fn current_user(&self) -> Result<PrincipalInfo> {
        let (_, principal) = authenticated_principal(&self.sessions).await?;
        Ok(principal.into())
    }

    /// Every principal; administrators only
    pub async fn all_users(&self) -> Result<Vec<PrincipalInfo>> {
        let (_, principal) = authenticated_principal(&self.sessions).await?;
        ensure_admin(&principal)?;

        let users = self.sessions.gateway().list_users().await?;
        Ok(users.into_iter().map(PrincipalInfo::from).collect())
    }

    /// Apply `changes` to the logged-in principal's profile.
    ///
    /// The privilege flag and credential digest are carried over unchanged.
    /// The backend invalidates every token of a principal on `user.mod`, so a
    /// successful update ends the local session and the caller must log in
    /// again. An empty `changes` sends nothing and keeps the session.
    pub async fn update_profile(&self, changes: ProfileChanges) -> Result<PrincipalInfo> {
        let (session, principal) = authenticated_principal(&self.sessions).await?;
        if changes.is_empty() {
            return Ok(principal.into());
        }

        let mut update = PrincipalUpdate::from(principal);
        if let Some(name) = changes.name {
            if name.trim().is_empty() {
                return Err(Error::rejected("name cannot be empty"));
            }
            update.name = Some(name);
        }
        if let Some(tel) = changes.tel {
            update.tel = Some(non_empty(tel));
        }
        if let Some(email) = changes.email {
            update.email = Some(non_empty(email));
        }

        if !self.sessions.gateway().modify_user(&update).await? {
            warn!(uid = %session.uid, "Profile update refused by backend");
            return Err(Error::rejected("update failed"));
        }
        info!(uid = %session.uid, "Profile updated; session ended");
        self.sessions.end_session(&session);

        self.sessions
            .gateway()
            .query_user(&session.uid)
            .await?
            .map(PrincipalInfo::from)
            .ok_or_else(|| Error::rejected("user does not exist"))
    }

    /// Change the password; the current session ends either way.
    pub async fn change_password(&self, new_secret: &str) -> Result<CredentialRotation> {
        if new_secret.is_empty() {
            return Err(Error::rejected("password is required"));
        }
        self.sessions.rotate_credential(new_secret).await
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
