//! Account lookup and password checks.
//!
//! The session manager only talks to [`AccountDirectory`]; [`Accounts`] is
//! the redb + bcrypt implementation the service runs with.

use chrono::Utc;
use thiserror::Error;

use crate::storage::models::Account;
use crate::storage::{AccountConflict, Database, DatabaseError};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("email already taken")]
    EmailTaken,
    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("email and username taken")]
    UsernameAndEmailTaken,
    #[error("username already taken")]
    UsernameTaken,
}

impl From<AccountConflict> for AccountError {
    fn from(conflict: AccountConflict) -> Self {
        match (conflict.username, conflict.email) {
            (true, true) => AccountError::UsernameAndEmailTaken,
            (true, false) => AccountError::UsernameTaken,
            _ => AccountError::EmailTaken,
        }
    }
}

/// Identity collaborator for the session lifecycle
pub trait AccountDirectory: Send + Sync {
    /// Look up an account by username or email (anything containing '@').
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, AccountError>;

    fn verify_password(&self, account: &Account, password: &str) -> Result<bool, AccountError>;

    fn create(&self, username: &str, email: &str, password: &str) -> Result<Account, AccountError>;
}

/// Lowercase and strip all whitespace
pub fn normalize_identifier(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// redb-backed accounts with bcrypt password hashes
#[derive(Clone)]
pub struct Accounts {
    db: Database,
    hash_cost: u32,
}

impl Accounts {
    pub fn new(db: Database, hash_cost: u32) -> Self {
        Self { db, hash_cost }
    }
}

impl AccountDirectory for Accounts {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, AccountError> {
        let identifier = normalize_identifier(identifier);
        let account = if identifier.contains('@') {
            self.db.get_account_by_email(&identifier)?
        } else {
            self.db.get_account_by_username(&identifier)?
        };
        Ok(account)
    }

    fn verify_password(&self, account: &Account, password: &str) -> Result<bool, AccountError> {
        Ok(bcrypt::verify(password, &account.password_hash)?)
    }

    fn create(&self, username: &str, email: &str, password: &str) -> Result<Account, AccountError> {
        let account = Account {
            created_at: Utc::now(),
            email: normalize_identifier(email),
            id: uuid::Uuid::new_v4().to_string(),
            password_hash: bcrypt::hash(password, self.hash_cost)?,
            username: normalize_identifier(username),
        };

        if let Some(conflict) = self.db.insert_account(&account)? {
            return Err(conflict.into());
        }

        tracing::info!(user_id = %account.id, "Created account");
        Ok(account)
    }
}
