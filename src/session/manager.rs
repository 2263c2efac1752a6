//! Session manager
//!
//! Owns the (uid, token) pair for one client context and is the only thing
//! that writes it. Privileged callers go through [`SessionManager::require_session`]
//! before doing anything else.
//!
//! Login, logout and credential rotation for the same uid are serialized by a
//! per-principal lock, so a rotation cannot interleave with a second rotation
//! or a login for that principal.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::best_effort::BestEffort;
use super::store::{Session, SessionStore};
use crate::auth::{hash_password_async, verify_password_async};
use crate::gateway::Gateway;
use crate::types::{Error, PrincipalUpdate, Result};

/// How a successful password change ended
#[derive(Debug)]
pub enum CredentialRotation {
    /// Password changed and the old token revoked
    Rotated,
    /// Password changed but revoking the old token failed
    ///
    /// The local session is cleared either way; the old token may stay
    /// usable at the backend until it expires.
    RevokeFailed(Error),
}

impl CredentialRotation {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Rotated)
    }
}

pub struct SessionManager {
    gateway: Gateway,
    store: Arc<dyn SessionStore>,
    principal_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionManager {
    pub fn new(gateway: Gateway, store: Arc<dyn SessionStore>) -> Self {
        Self {
            gateway,
            store,
            principal_locks: DashMap::new(),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Authenticate `uid` with `secret` and store the issued token.
    ///
    /// # Errors
    /// - `Rejected("user does not exist")` without a token being minted
    /// - `Rejected("password incorrect")`
    /// - `MalformedDigest` if the stored digest cannot be parsed
    /// - transport/decode errors from the backend
    pub async fn login(&self, uid: &str, secret: &str) -> Result<Session> {
        let _guard = self.lock_principal(uid).await;

        let principal = match self.gateway.query_user(uid).await? {
            Some(principal) => principal,
            None => {
                info!(uid = %uid, "Login rejected: unknown user");
                return Err(Error::rejected("user does not exist"));
            }
        };

        if !verify_password_async(secret.to_string(), principal.pwh.clone()).await? {
            info!(uid = %uid, "Login rejected: password incorrect");
            return Err(Error::rejected("password incorrect"));
        }

        let token = self.gateway.mint_token(uid).await?;
        if token.is_empty() {
            warn!(uid = %uid, "Backend issued an empty token");
            return Err(Error::rejected("token issuance failed"));
        }

        let session = Session::new(principal.uid, token);
        self.store.save(&session)?;

        info!(uid = %session.uid, "Logged in");
        Ok(session)
    }

    /// Gate for privileged operations.
    ///
    /// Fails with `NotLoggedIn` before any network traffic when no pair is
    /// stored. A stored pair the backend rejects is cleared and reported as
    /// `SessionInvalid`. Transport failures leave the pair in place.
    pub async fn require_session(&self) -> Result<Session> {
        let session = self.store.load()?.ok_or(Error::NotLoggedIn)?;

        if self
            .gateway
            .validate_token(&session.uid, &session.token)
            .await?
        {
            debug!(uid = %session.uid, "Session validated");
            return Ok(session);
        }

        warn!(uid = %session.uid, "Session rejected by backend, clearing");
        if let Err(e) = self.store.clear_if(&session) {
            warn!(uid = %session.uid, error = %e, "Failed to clear rejected session");
        }
        Err(Error::SessionInvalid)
    }

    /// Revoke the current token and forget the session.
    ///
    /// Never fails for the caller: the local pair is cleared even when the
    /// backend is unreachable. Swallowed failures are logged and returned in
    /// the outcome.
    pub async fn logout(&self) -> BestEffort<()> {
        let mut outcome = BestEffort::new(());

        let session = match self.store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Could not read session during logout");
                outcome.record(e);
                None
            }
        };

        let _guard = match session {
            Some(ref s) => Some(self.lock_principal(&s.uid).await),
            None => None,
        };

        if let Some(ref session) = session {
            if let Err(e) = self.gateway.revoke_token(&session.token).await {
                warn!(
                    uid = %session.uid,
                    error = %e,
                    kind = ?e.kind(),
                    "Token revocation failed during logout; clearing local session anyway"
                );
                outcome.record(e);
            }
        }

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear local session during logout");
            outcome.record(e);
        }

        match session {
            Some(session) => info!(uid = %session.uid, clean = outcome.is_clean(), "Logged out"),
            None => debug!("Logout without a stored session"),
        }

        outcome
    }

    /// Change the current principal's password and invalidate its session.
    ///
    /// After a successful update the old token is revoked at the backend and
    /// the local pair is cleared, so the caller must log in again.
    ///
    /// # Errors
    /// - `NotLoggedIn` / `SessionInvalid` from the session gate
    /// - `Rejected("password update failed")` when the backend refuses the update
    pub async fn rotate_credential(&self, new_secret: &str) -> Result<CredentialRotation> {
        let stored = self.store.load()?.ok_or(Error::NotLoggedIn)?;
        let _guard = self.lock_principal(&stored.uid).await;

        // Re-check under the lock; a concurrent rotation may have cleared it.
        let session = self.require_session().await?;

        // user.mod needs every field, not just pwh.
        let principal = self
            .gateway
            .query_user(&session.uid)
            .await?
            .ok_or_else(|| Error::rejected("user does not exist"))?;

        let pwh = hash_password_async(new_secret.to_string()).await?;
        let update = PrincipalUpdate::from(principal).with_pwh(pwh);

        if !self.gateway.modify_user(&update).await? {
            warn!(uid = %session.uid, "Password update refused by backend");
            return Err(Error::rejected("password update failed"));
        }
        info!(uid = %session.uid, "Password updated");

        let rotation = match self.gateway.revoke_token(&session.token).await {
            Ok(()) => CredentialRotation::Rotated,
            Err(e) => {
                warn!(
                    uid = %session.uid,
                    error = %e,
                    "Password updated but old token revocation failed"
                );
                CredentialRotation::RevokeFailed(e)
            }
        };

        self.end_session(&session);

        Ok(rotation)
    }

    /// Forget `session` locally after the backend has invalidated it.
    ///
    /// Leaves a newer session (from a concurrent login) in place.
    pub fn end_session(&self, session: &Session) {
        match self.store.clear_if(session) {
            Ok(true) => debug!(uid = %session.uid, "Local session cleared"),
            Ok(false) => debug!(uid = %session.uid, "Local session already replaced"),
            Err(e) => warn!(uid = %session.uid, error = %e, "Failed to clear local session"),
        }
    }

    async fn lock_principal(&self, uid: &str) -> PrincipalGuard<'_> {
        let lock = self
            .principal_locks
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        PrincipalGuard {
            locks: &self.principal_locks,
            uid: uid.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }
}

/// Exclusive hold on one principal's lock
///
/// The lock table entry is removed when the last holder or waiter lets go.
struct PrincipalGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    uid: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PrincipalGuard<'_> {
    fn drop(&mut self) {
        // Release first so our own Arc no longer counts.
        self.guard.take();
        self.locks
            .remove_if(self.uid.as_str(), |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, verify_password};
    use crate::protocol::Reply;
    use crate::session::MemorySessionStore;
    use crate::transport::MockTransport;
    use serde_json::{json, Value};

    fn principal(uid: &str, secret: &str) -> Value {
        json!({
            "uid": uid,
            "name": "Test User",
            "tel": null,
            "email": null,
            "super": false,
            "pwh": hash_password(secret).unwrap(),
        })
    }

    fn manager(
        mock: MockTransport,
        session: Option<Session>,
    ) -> (SessionManager, Arc<MockTransport>, Arc<MemorySessionStore>) {
        let mock = Arc::new(mock);
        let store = Arc::new(match session {
            Some(s) => MemorySessionStore::with_session(s),
            None => MemorySessionStore::new(),
        });
        let manager = SessionManager::new(Gateway::new(mock.clone()), store.clone());
        (manager, mock, store)
    }

    #[tokio::test]
    async fn test_login_unknown_user_never_mints() {
        let (mgr, mock, store) = manager(
            MockTransport::new()
                .reply("user.query", Reply::Json(json!(null)))
                .reply("user.mktoken", Reply::Json(json!("tok"))),
            None,
        );

        let err = mgr.login("ghost", "pw").await.unwrap_err();
        assert!(matches!(err, Error::Rejected(ref m) if m == "user does not exist"));
        assert_eq!(mock.ops(), vec!["user.query"]);
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (mgr, mock, _) = manager(
            MockTransport::new()
                .reply("user.query", Reply::Json(principal("u1", "right")))
                .reply("user.mktoken", Reply::Json(json!("tok"))),
            None,
        );

        let err = mgr.login("u1", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Rejected(ref m) if m == "password incorrect"));
        assert_eq!(mock.ops(), vec!["user.query"]);
    }

    #[tokio::test]
    async fn test_login_stores_session() {
        let (mgr, mock, store) = manager(
            MockTransport::new()
                .reply("user.query", Reply::Json(principal("u1", "secret123")))
                .reply("user.mktoken", Reply::Json(json!("tok-1"))),
            None,
        );

        let session = mgr.login("u1", "secret123").await.unwrap();
        assert_eq!(session, Session::new("u1", "tok-1"));
        assert_eq!(store.load().unwrap(), Some(session));
        assert_eq!(mock.ops(), vec!["user.query", "user.mktoken"]);
        assert_eq!(mock.sent()[1].field("uid"), Some(&json!("u1")));
        assert!(mgr.principal_locks.is_empty());
    }

    #[tokio::test]
    async fn test_login_with_corrupt_digest_fails_hard() {
        let mut record = principal("u1", "pw");
        record["pwh"] = json!("no-separator");
        let (mgr, _, _) = manager(
            MockTransport::new().reply("user.query", Reply::Json(record)),
            None,
        );

        let err = mgr.login("u1", "pw").await.unwrap_err();
        assert!(matches!(err, Error::MalformedDigest(_)));
    }

    #[tokio::test]
    async fn test_require_session_without_pair_skips_backend() {
        let (mgr, mock, _) = manager(MockTransport::new(), None);

        let err = mgr.require_session().await.unwrap_err();
        assert!(matches!(err, Error::NotLoggedIn));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_token_clears_session() {
        let (mgr, mock, store) = manager(
            MockTransport::new().reply("user.validate", Reply::Json(json!(false))),
            Some(Session::new("u1", "bad")),
        );

        let err = mgr.require_session().await.unwrap_err();
        assert!(matches!(err, Error::SessionInvalid));
        assert!(store.load().unwrap().is_none());
        assert_eq!(mock.ops(), vec!["user.validate"]);
    }

    #[tokio::test]
    async fn test_validation_transport_failure_keeps_session() {
        let (mgr, _, store) = manager(
            MockTransport::new().fail("user.validate", "connection reset"),
            Some(Session::new("u1", "tok")),
        );

        let err = mgr.require_session().await.unwrap_err();
        assert!(err.is_transport());
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_logout_survives_revoke_failure() {
        let (mgr, mock, store) = manager(
            MockTransport::new().fail("user.rmtoken", "connection refused"),
            Some(Session::new("u1", "tok")),
        );

        let outcome = mgr.logout().await;
        assert!(!outcome.is_clean());
        assert!(outcome.failures()[0].is_transport());
        assert!(store.load().unwrap().is_none());
        assert_eq!(mock.ops(), vec!["user.rmtoken"]);
    }

    #[tokio::test]
    async fn test_logout_without_session_is_local() {
        let (mgr, mock, _) = manager(MockTransport::new(), None);

        let outcome = mgr.logout().await;
        assert!(outcome.is_clean());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rotate_revokes_old_token() {
        let (mgr, mock, store) = manager(
            MockTransport::new()
                .reply("user.validate", Reply::Json(json!(true)))
                .reply("user.query", Reply::Json(principal("u1", "old-secret")))
                .reply("user.mod", Reply::Json(json!(true)))
                .reply("user.rmtoken", Reply::Json(json!(null))),
            Some(Session::new("u1", "old-tok")),
        );

        let rotation = mgr.rotate_credential("new-secret").await.unwrap();
        assert!(rotation.is_clean());
        assert_eq!(
            mock.ops(),
            vec!["user.validate", "user.query", "user.mod", "user.rmtoken"]
        );

        let sent = mock.sent();
        let pwh = sent[2].field("pwh").and_then(Value::as_str).unwrap();
        assert!(verify_password("new-secret", pwh).unwrap());
        assert!(!verify_password("old-secret", pwh).unwrap());
        assert_eq!(sent[2].field("uid"), Some(&json!("u1")));
        assert_eq!(sent[2].field("name"), Some(&json!("Test User")));
        assert_eq!(sent[3].field("token"), Some(&json!("old-tok")));

        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_update_refused() {
        let (mgr, mock, store) = manager(
            MockTransport::new()
                .reply("user.validate", Reply::Json(json!(true)))
                .reply("user.query", Reply::Json(principal("u1", "old")))
                .reply("user.mod", Reply::Json(json!(false))),
            Some(Session::new("u1", "tok")),
        );

        let err = mgr.rotate_credential("new").await.unwrap_err();
        assert!(matches!(err, Error::Rejected(ref m) if m == "password update failed"));
        assert_eq!(mock.ops(), vec!["user.validate", "user.query", "user.mod"]);
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rotate_revoke_failure_is_distinct() {
        let (mgr, _, store) = manager(
            MockTransport::new()
                .reply("user.validate", Reply::Json(json!(true)))
                .reply("user.query", Reply::Json(principal("u1", "old")))
                .reply("user.mod", Reply::Json(json!(true)))
                .fail("user.rmtoken", "connection reset"),
            Some(Session::new("u1", "tok")),
        );

        let rotation = mgr.rotate_credential("new").await.unwrap();
        assert!(matches!(rotation, CredentialRotation::RevokeFailed(ref e) if e.is_transport()));
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_rotations_are_serialized() {
        let (mgr, mock, _) = manager(
            MockTransport::new()
                .reply("user.validate", Reply::Json(json!(true)))
                .reply("user.query", Reply::Json(principal("u1", "old")))
                .reply("user.mod", Reply::Json(json!(true)))
                .reply("user.rmtoken", Reply::Json(json!(null))),
            Some(Session::new("u1", "tok")),
        );

        let (a, b) = tokio::join!(mgr.rotate_credential("one"), mgr.rotate_credential("two"));

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::NotLoggedIn))));
        assert_eq!(
            mock.ops().iter().filter(|op| op.as_str() == "user.mod").count(),
            1
        );
        assert!(mgr.principal_locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_entry_kept_while_waiter_queued() {
        let (mgr, _, _) = manager(MockTransport::new(), None);

        let first = mgr.lock_principal("u1").await;
        let waiter = mgr.lock_principal("u1");
        tokio::pin!(waiter);

        // Poll once so the waiter clones the lock and queues behind `first`.
        assert!(futures_util::poll!(waiter.as_mut()).is_pending());
        drop(first);
        assert_eq!(mgr.principal_locks.len(), 1);

        let second = waiter.await;
        drop(second);
        assert!(mgr.principal_locks.is_empty());
    }

    #[test]
    fn test_end_session_keeps_newer_session() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("u1", "new")));
        let mgr = SessionManager::new(Gateway::new(Arc::new(MockTransport::new())), store.clone());

        mgr.end_session(&Session::new("u1", "old"));
        assert_eq!(store.load().unwrap(), Some(Session::new("u1", "new")));

        mgr.end_session(&Session::new("u1", "new"));
        assert_eq!(store.load().unwrap(), None);
    }
}
