//! Refresh-token session lifecycle.
//!
//! Per user: Anonymous -> (register | login) -> Authenticated, holding one
//! refresh credential per device. `refresh` exchanges a stored refresh
//! envelope for a new access envelope without rotating it. `logout` drops one
//! credential; `logout_all` drops every credential for the user, and other
//! devices fall back to Anonymous on their next refresh once their current
//! access envelope expires.

use serde::Serialize;
use thiserror::Error;

use crate::accounts::{AccountDirectory, AccountError};
use crate::storage::models::RefreshCredential;
use crate::storage::{CredentialError, CredentialStore};
use crate::tokens::{TokenError, TokenKind, TokenService};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("account doesn't exist")]
    AccountNotFound,
    #[error("Account error: {0}")]
    Accounts(#[source] AccountError),
    #[error("password incorrect")]
    BadPassword,
    #[error("Credential store error: {0}")]
    Credentials(#[from] CredentialError),
    #[error("email already taken")]
    EmailTaken,
    #[error("Token signing error: {0}")]
    Signing(#[source] TokenError),
    #[error("Token expired")]
    TokenExpired,
    #[error("Refresh token and stored token don't match")]
    TokenMismatch,
    #[error("Refresh token not found")]
    TokenNotFound,
    #[error("Token tampered with")]
    TokenTampered,
    /// Identity was established (and, on registration, the account created)
    /// but the refresh credential could not be persisted. No tokens are
    /// handed out; the caller should log in again.
    #[error("tokens not saved: {0}")]
    TokensNotSaved(#[source] CredentialError),
    #[error("email and username taken")]
    UsernameAndEmailTaken,
    #[error("username already taken")]
    UsernameTaken,
}

impl From<AccountError> for SessionError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::EmailTaken => SessionError::EmailTaken,
            AccountError::UsernameTaken => SessionError::UsernameTaken,
            AccountError::UsernameAndEmailTaken => SessionError::UsernameAndEmailTaken,
            other => SessionError::Accounts(other),
        }
    }
}

/// Verification failures of a presented envelope
impl From<TokenError> for SessionError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => SessionError::TokenExpired,
            TokenError::InvalidSignature => SessionError::TokenTampered,
            TokenError::Encoding(_) | TokenError::Lifetime => SessionError::Signing(e),
        }
    }
}

/// Tokens handed out on login/registration
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Orchestrates the token service, credential store and account directory
pub struct SessionManager<S, A> {
    accounts: A,
    store: S,
    tokens: TokenService,
}

impl<S: CredentialStore, A: AccountDirectory> SessionManager<S, A> {
    pub fn new(tokens: TokenService, store: S, accounts: A) -> Self {
        Self {
            accounts,
            store,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an account and log it in.
    ///
    /// If the account is created but its refresh credential cannot be
    /// stored, fails with `TokensNotSaved` and the account remains.
    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, SessionError> {
        let account = self.accounts.create(username, email, password)?;
        self.issue_pair(&account.id)
    }

    /// Check credentials and issue an access + refresh pair
    pub fn login(&self, identifier: &str, password: &str) -> Result<TokenPair, SessionError> {
        let account = self
            .accounts
            .find_by_identifier(identifier)?
            .ok_or(SessionError::AccountNotFound)?;

        if !self.accounts.verify_password(&account, password)? {
            tracing::debug!(user_id = %account.id, "Login rejected: bad password");
            return Err(SessionError::BadPassword);
        }

        self.issue_pair(&account.id)
    }

    /// Exchange a stored refresh envelope for a new access envelope.
    ///
    /// The envelope must verify and must still be stored for its user, so a
    /// correctly signed but revoked envelope is refused.
    pub fn refresh(&self, refresh_envelope: &str) -> Result<String, SessionError> {
        let claims = self.tokens.verify(refresh_envelope, TokenKind::Refresh)?;

        let credential = self
            .store
            .find_by_user_and_token(&claims.user_id, refresh_envelope)?
            .ok_or(SessionError::TokenNotFound)?;

        if credential.owner_user_id != claims.user_id || credential.token_value != refresh_envelope
        {
            tracing::warn!(user_id = %claims.user_id, "Stored refresh credential does not match presented token");
            return Err(SessionError::TokenMismatch);
        }

        let access = self
            .tokens
            .issue_access(&claims.user_id)
            .map_err(SessionError::Signing)?;
        tracing::debug!(user_id = %claims.user_id, "Issued access token from refresh token");
        Ok(access.value)
    }

    /// Revoke the presented refresh envelope.
    ///
    /// Idempotent: returns the number of credentials removed, and zero
    /// (already logged out) is a success.
    pub fn logout(&self, refresh_envelope: &str) -> Result<usize, SessionError> {
        let claims = self.tokens.verify(refresh_envelope, TokenKind::Refresh)?;
        let deleted = self
            .store
            .delete_by_user_and_token(&claims.user_id, refresh_envelope)?;
        tracing::info!(user_id = %claims.user_id, revoked = deleted, "Logged out");
        Ok(deleted)
    }

    /// Revoke every refresh credential of the envelope's user.
    ///
    /// Other devices keep their current access envelope until it expires;
    /// their next refresh fails with `TokenNotFound`. Zero removed is a
    /// success.
    pub fn logout_all(&self, refresh_envelope: &str) -> Result<usize, SessionError> {
        let claims = self.tokens.verify(refresh_envelope, TokenKind::Refresh)?;
        let deleted = self.store.delete_all_for_user(&claims.user_id)?;
        tracing::info!(user_id = %claims.user_id, revoked = deleted, "Logged out of all devices");
        Ok(deleted)
    }

    /// Resolve an access envelope to its user id
    pub fn authenticate(&self, access_envelope: &str) -> Result<String, SessionError> {
        let claims = self.tokens.verify(access_envelope, TokenKind::Access)?;
        Ok(claims.user_id)
    }

    /// Active refresh credentials (devices) for a user
    pub fn devices(&self, user_id: &str) -> Result<Vec<RefreshCredential>, SessionError> {
        Ok(self.store.list_for_user(user_id)?)
    }

    /// Sign both envelopes, then persist the refresh one. Either both are
    /// returned or neither.
    fn issue_pair(&self, user_id: &str) -> Result<TokenPair, SessionError> {
        let access = self
            .tokens
            .issue_access(user_id)
            .map_err(SessionError::Signing)?;
        let refresh = self
            .tokens
            .issue_refresh(user_id)
            .map_err(SessionError::Signing)?;

        let credential = RefreshCredential {
            expires_at: refresh.expires_at,
            issued_at: refresh.issued_at,
            owner_user_id: user_id.to_string(),
            token_value: refresh.value.clone(),
        };

        if let Err(e) = self.store.put(&credential) {
            tracing::error!(user_id = %user_id, error = %e, "Failed to persist refresh token");
            return Err(SessionError::TokensNotSaved(e));
        }

        tracing::info!(user_id = %user_id, "Issued session tokens");
        Ok(TokenPair {
            access_token: access.value,
            refresh_token: refresh.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Accounts;
    use crate::storage::Database;
    use crate::testutil::{setup_db, test_config, test_sessions};
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    fn registered(
        sessions: &SessionManager<Database, Accounts>,
    ) -> TokenPair {
        sessions
            .register("alice", "alice@example.com", "hunter22")
            .unwrap()
    }

    #[test]
    fn test_register_issues_and_persists() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);

        let pair = registered(&sessions);
        let user_id = sessions.authenticate(&pair.access_token).unwrap();

        let stored = db.list_for_user(&user_id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].token_value, pair.refresh_token);
    }

    #[test]
    fn test_register_taken_username() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);

        registered(&sessions);
        assert!(matches!(
            sessions.register("Alice", "new@example.com", "pw"),
            Err(SessionError::UsernameTaken)
        ));
    }

    #[test]
    fn test_login_by_username_and_email() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);
        registered(&sessions);

        let a = sessions.login("alice", "hunter22").unwrap();
        let b = sessions.login("Alice@Example.com", "hunter22").unwrap();

        // One credential per device
        let user_id = sessions.authenticate(&a.access_token).unwrap();
        assert_eq!(db.list_for_user(&user_id).unwrap().len(), 3);
        assert_ne!(a.refresh_token, b.refresh_token);
    }

    #[test]
    fn test_login_failures() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);
        registered(&sessions);

        assert!(matches!(
            sessions.login("nobody", "hunter22"),
            Err(SessionError::AccountNotFound)
        ));
        assert!(matches!(
            sessions.login("alice", "wrong"),
            Err(SessionError::BadPassword)
        ));
    }

    #[test]
    fn test_refresh_issues_access() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);
        let pair = registered(&sessions);

        let access = sessions.refresh(&pair.refresh_token).unwrap();
        assert_eq!(
            sessions.authenticate(&access).unwrap(),
            sessions.authenticate(&pair.access_token).unwrap()
        );

        // Not rotated: the same refresh token keeps working
        assert!(sessions.refresh(&pair.refresh_token).is_ok());
    }

    #[test]
    fn test_refresh_never_persisted_token() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);

        let unsaved = sessions.tokens().issue_refresh("user-1").unwrap();
        assert!(matches!(
            sessions.refresh(&unsaved.value),
            Err(SessionError::TokenNotFound)
        ));
    }

    #[test]
    fn test_refresh_rejects_access_token() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);
        let pair = registered(&sessions);

        assert!(matches!(
            sessions.refresh(&pair.access_token),
            Err(SessionError::TokenTampered)
        ));
    }

    #[test]
    fn test_refresh_expired_token() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);

        let stale = sessions
            .tokens()
            .issue_at(TokenKind::Refresh, "user-1", Utc::now() - Duration::days(400))
            .unwrap();
        db.put(&RefreshCredential {
            expires_at: stale.expires_at,
            issued_at: stale.issued_at,
            owner_user_id: "user-1".to_string(),
            token_value: stale.value.clone(),
        })
        .unwrap();

        assert!(matches!(
            sessions.refresh(&stale.value),
            Err(SessionError::TokenExpired)
        ));
    }

    #[test]
    fn test_logout_revokes_one_device() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);
        let phone = registered(&sessions);
        let laptop = sessions.login("alice", "hunter22").unwrap();

        assert_eq!(sessions.logout(&phone.refresh_token).unwrap(), 1);

        assert!(matches!(
            sessions.refresh(&phone.refresh_token),
            Err(SessionError::TokenNotFound)
        ));
        assert!(sessions.refresh(&laptop.refresh_token).is_ok());
    }

    #[test]
    fn test_logout_is_idempotent() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);
        let pair = registered(&sessions);

        assert_eq!(sessions.logout(&pair.refresh_token).unwrap(), 1);
        assert_eq!(sessions.logout(&pair.refresh_token).unwrap(), 0);
    }

    #[test]
    fn test_logout_tampered() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);

        assert!(matches!(
            sessions.logout("garbage"),
            Err(SessionError::TokenTampered)
        ));
        assert!(matches!(
            sessions.logout_all("garbage"),
            Err(SessionError::TokenTampered)
        ));
    }

    #[test]
    fn test_logout_all_revokes_every_device() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);
        let phone = registered(&sessions);
        let laptop = sessions.login("alice", "hunter22").unwrap();
        let tablet = sessions.login("alice", "hunter22").unwrap();

        assert_eq!(sessions.logout_all(&phone.refresh_token).unwrap(), 3);

        for device in [&phone, &laptop, &tablet] {
            assert!(matches!(
                sessions.refresh(&device.refresh_token),
                Err(SessionError::TokenNotFound)
            ));
        }

        // Nothing left to revoke is still a success
        assert_eq!(sessions.logout_all(&laptop.refresh_token).unwrap(), 0);
    }

    #[test]
    fn test_logout_all_leaves_other_users() {
        let (db, _temp) = setup_db();
        let sessions = test_sessions(&db);
        let alice = registered(&sessions);
        let bob = sessions.register("bob", "bob@example.com", "pw").unwrap();

        sessions.logout_all(&alice.refresh_token).unwrap();
        assert!(sessions.refresh(&bob.refresh_token).is_ok());
    }

    /// Store whose writes always fail and whose lookups return a fixed row
    struct BrokenStore {
        stored: Mutex<Option<RefreshCredential>>,
    }

    impl CredentialStore for BrokenStore {
        fn put(&self, _: &RefreshCredential) -> Result<(), CredentialError> {
            Err(CredentialError::DuplicateToken)
        }

        fn find_by_user_and_token(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<RefreshCredential>, CredentialError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        fn delete_by_user_and_token(&self, _: &str, _: &str) -> Result<usize, CredentialError> {
            Ok(0)
        }

        fn delete_all_for_user(&self, _: &str) -> Result<usize, CredentialError> {
            Ok(0)
        }

        fn list_for_user(&self, _: &str) -> Result<Vec<RefreshCredential>, CredentialError> {
            Ok(Vec::new())
        }
    }

    fn broken_sessions(db: &Database) -> SessionManager<BrokenStore, Accounts> {
        let config = test_config();
        SessionManager::new(
            TokenService::new(&config.tokens),
            BrokenStore {
                stored: Mutex::new(None),
            },
            Accounts::new(db.clone(), config.accounts.password_hash_cost),
        )
    }

    #[test]
    fn test_tokens_not_saved_on_register() {
        let (db, _temp) = setup_db();
        let sessions = broken_sessions(&db);

        assert!(matches!(
            sessions.register("alice", "alice@example.com", "pw"),
            Err(SessionError::TokensNotSaved(_))
        ));

        // The account exists; the user is expected to log in again
        assert!(db.get_account_by_username("alice").unwrap().is_some());
    }

    #[test]
    fn test_tokens_not_saved_on_login() {
        let (db, _temp) = setup_db();
        registered(&test_sessions(&db));
        let sessions = broken_sessions(&db);

        // Neither token is handed out when the refresh row cannot be stored
        assert!(matches!(
            sessions.login("alice", "hunter22"),
            Err(SessionError::TokensNotSaved(_))
        ));
        // Identity checks still run before persistence
        assert!(matches!(
            sessions.login("alice", "wrong"),
            Err(SessionError::BadPassword)
        ));
    }

    #[test]
    fn test_refresh_mismatched_store_row() {
        let (db, _temp) = setup_db();
        let sessions = broken_sessions(&db);

        let presented = sessions.tokens().issue_refresh("user-1").unwrap();
        let other = sessions.tokens().issue_refresh("user-1").unwrap();
        *sessions.store().stored.lock().unwrap() = Some(RefreshCredential {
            expires_at: other.expires_at,
            issued_at: other.issued_at,
            owner_user_id: "user-1".to_string(),
            token_value: other.value,
        });

        assert!(matches!(
            sessions.refresh(&presented.value),
            Err(SessionError::TokenMismatch)
        ));
    }
}
