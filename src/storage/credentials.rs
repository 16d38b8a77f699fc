//! Refresh credential storage.
//!
//! Credentials are keyed by their token value (globally unique) with a
//! per-user index for logout-all and an expiration index for the cleaner.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use thiserror::Error;

use super::db::{expiry_key, expiry_key_ms, Database, DatabaseError};
use super::models::RefreshCredential;
use super::tables::*;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Refresh token already exists")]
    DuplicateToken,
}

impl From<redb::StorageError> for CredentialError {
    fn from(e: redb::StorageError) -> Self {
        CredentialError::Database(e.into())
    }
}

impl From<redb::TableError> for CredentialError {
    fn from(e: redb::TableError) -> Self {
        CredentialError::Database(e.into())
    }
}

impl From<redb::CommitError> for CredentialError {
    fn from(e: redb::CommitError) -> Self {
        CredentialError::Database(e.into())
    }
}

impl From<rmp_serde::encode::Error> for CredentialError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        CredentialError::Database(e.into())
    }
}

impl From<rmp_serde::decode::Error> for CredentialError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        CredentialError::Database(e.into())
    }
}

/// Storage contract for refresh credentials.
///
/// Deletions report how many rows went away; zero is not an error.
pub trait CredentialStore: Send + Sync {
    /// Persist a credential. Fails with [`CredentialError::DuplicateToken`]
    /// if the token value is already stored (for any user).
    fn put(&self, credential: &RefreshCredential) -> Result<(), CredentialError>;

    fn find_by_user_and_token(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Option<RefreshCredential>, CredentialError>;

    fn delete_by_user_and_token(&self, user_id: &str, token: &str)
        -> Result<usize, CredentialError>;

    fn delete_all_for_user(&self, user_id: &str) -> Result<usize, CredentialError>;

    /// All credentials currently held by a user, one per device
    fn list_for_user(&self, user_id: &str) -> Result<Vec<RefreshCredential>, CredentialError>;
}

impl CredentialStore for Database {
    fn put(&self, credential: &RefreshCredential) -> Result<(), CredentialError> {
        debug_assert!(!credential.token_value.is_empty(), "token must not be empty");
        debug_assert!(
            !credential.owner_user_id.is_empty(),
            "owner_user_id must not be empty"
        );

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            if table.get(credential.token_value.as_str())?.is_some() {
                // Dropping the transaction aborts it
                return Err(CredentialError::DuplicateToken);
            }
            let data = rmp_serde::to_vec_named(credential)?;
            table.insert(credential.token_value.as_str(), data.as_slice())?;

            let mut index_table = write_txn.open_table(USER_REFRESH_TOKENS)?;
            let mut tokens = read_index(&index_table, &credential.owner_user_id)?;
            tokens.push(credential.token_value.clone());
            let index_data = rmp_serde::to_vec_named(&tokens)?;
            index_table.insert(credential.owner_user_id.as_str(), index_data.as_slice())?;

            let mut expiry_table = write_txn.open_table(REFRESH_TOKEN_EXPIRY)?;
            let ek = expiry_key(&credential.expires_at, &credential.token_value);
            expiry_table.insert(ek.as_str(), credential.token_value.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn find_by_user_and_token(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Option<RefreshCredential>, CredentialError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(REFRESH_TOKENS)?;

        let credential: Option<RefreshCredential> = table
            .get(token)?
            .map(|data| rmp_serde::from_slice(data.value()))
            .transpose()?;

        Ok(credential.filter(|c| c.owner_user_id == user_id))
    }

    fn delete_by_user_and_token(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<usize, CredentialError> {
        let write_txn = self.begin_write()?;

        let credential: Option<RefreshCredential> = {
            let table = write_txn.open_table(REFRESH_TOKENS)?;
            let result = table.get(token)?;
            match result {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            }
        };

        let deleted = match credential {
            Some(credential) if credential.owner_user_id == user_id => {
                remove_credential(&write_txn, &credential)?;
                1
            }
            _ => 0,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    fn delete_all_for_user(&self, user_id: &str) -> Result<usize, CredentialError> {
        let write_txn = self.begin_write()?;

        let tokens = {
            let index_table = write_txn.open_table(USER_REFRESH_TOKENS)?;
            read_index(&index_table, user_id)?
        };

        let mut deleted = 0;
        for token in &tokens {
            let credential: Option<RefreshCredential> = {
                let table = write_txn.open_table(REFRESH_TOKENS)?;
                let result = table.get(token.as_str())?;
                match result {
                    Some(data) => Some(rmp_serde::from_slice(data.value())?),
                    None => None,
                }
            };
            if let Some(credential) = credential {
                remove_credential(&write_txn, &credential)?;
                deleted += 1;
            }
        }

        write_txn.commit()?;
        Ok(deleted)
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<RefreshCredential>, CredentialError> {
        let read_txn = self.begin_read()?;
        let index_table = read_txn.open_table(USER_REFRESH_TOKENS)?;
        let tokens_table = read_txn.open_table(REFRESH_TOKENS)?;

        let tokens: Vec<String> = match index_table.get(user_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut credentials = Vec::new();
        for token in tokens {
            if let Some(data) = tokens_table.get(token.as_str())? {
                credentials.push(rmp_serde::from_slice(data.value())?);
            }
        }

        Ok(credentials)
    }
}

impl Database {
    /// Delete credentials whose expiry is at or before `now`, walking the
    /// expiration index in order (no full table scan).
    pub fn delete_expired_credentials(&self, now: DateTime<Utc>) -> Result<usize, CredentialError> {
        let now_ms = now.timestamp_millis();

        let write_txn = self.begin_write()?;
        let expired: Vec<(String, String)> = {
            let table = write_txn.open_table(REFRESH_TOKEN_EXPIRY)?;
            let mut result = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let key_str = key.value().to_string();
                match expiry_key_ms(&key_str) {
                    Some(ms) if ms <= now_ms => {
                        result.push((key_str, value.value().to_string()));
                    }
                    _ => break,
                }
            }
            result
        };

        for (expiry_key_val, token) in &expired {
            let credential: Option<RefreshCredential> = {
                let table = write_txn.open_table(REFRESH_TOKENS)?;
                let result = table.get(token.as_str())?;
                match result {
                    Some(data) => Some(rmp_serde::from_slice(data.value())?),
                    None => None,
                }
            };

            match credential {
                Some(credential) => remove_credential(&write_txn, &credential)?,
                None => {
                    // Orphaned index entry
                    let mut expiry_table = write_txn.open_table(REFRESH_TOKEN_EXPIRY)?;
                    expiry_table.remove(expiry_key_val.as_str())?;
                }
            }
        }

        write_txn.commit()?;
        Ok(expired.len())
    }
}

/// Remove a credential and every index entry pointing at it
fn remove_credential(
    write_txn: &WriteTransaction,
    credential: &RefreshCredential,
) -> Result<(), CredentialError> {
    let token = credential.token_value.as_str();
    let owner = credential.owner_user_id.as_str();

    {
        let mut table = write_txn.open_table(REFRESH_TOKENS)?;
        table.remove(token)?;
    }

    {
        let mut index_table = write_txn.open_table(USER_REFRESH_TOKENS)?;
        let mut tokens = read_index(&index_table, owner)?;
        tokens.retain(|t| t != token);
        if tokens.is_empty() {
            index_table.remove(owner)?;
        } else {
            let index_data = rmp_serde::to_vec_named(&tokens)?;
            index_table.insert(owner, index_data.as_slice())?;
        }
    }

    {
        let mut expiry_table = write_txn.open_table(REFRESH_TOKEN_EXPIRY)?;
        let ek = expiry_key(&credential.expires_at, token);
        expiry_table.remove(ek.as_str())?;
    }

    Ok(())
}

fn read_index(
    index_table: &impl ReadableTable<&'static str, &'static [u8]>,
    user_id: &str,
) -> Result<Vec<String>, CredentialError> {
    Ok(index_table
        .get(user_id)?
        .map(|v| rmp_serde::from_slice(v.value()))
        .transpose()?
        .unwrap_or_default())
}
