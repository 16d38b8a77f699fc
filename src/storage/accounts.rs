use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::Account;
use super::tables::*;

/// Which unique fields collided when inserting an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountConflict {
    pub email: bool,
    pub username: bool,
}

impl Database {
    // ========================================================================
    // Account operations
    // ========================================================================

    /// Insert an account and its username/email index entries.
    ///
    /// Uniqueness is checked inside the same write transaction as the
    /// insert, so two concurrent registrations cannot both claim a name.
    pub fn insert_account(&self, account: &Account) -> Result<Option<AccountConflict>, DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut usernames = write_txn.open_table(USERNAMES)?;
            let mut emails = write_txn.open_table(EMAILS)?;

            let conflict = AccountConflict {
                username: usernames.get(account.username.as_str())?.is_some(),
                email: emails.get(account.email.as_str())?.is_some(),
            };
            if conflict.username || conflict.email {
                return Ok(Some(conflict));
            }

            usernames.insert(account.username.as_str(), account.id.as_str())?;
            emails.insert(account.email.as_str(), account.id.as_str())?;

            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            let data = rmp_serde::to_vec_named(account)?;
            accounts.insert(account.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(None)
    }

    /// Get an account by id
    pub fn get_account(&self, id: &str) -> Result<Option<Account>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get an account by normalized username
    pub fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, DatabaseError> {
        self.get_account_via_index(USERNAMES, username)
    }

    /// Get an account by normalized email
    pub fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, DatabaseError> {
        self.get_account_via_index(EMAILS, email)
    }

    fn get_account_via_index(
        &self,
        index: redb::TableDefinition<'static, &'static str, &'static str>,
        key: &str,
    ) -> Result<Option<Account>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index_table = read_txn.open_table(index)?;
        let accounts = read_txn.open_table(ACCOUNTS)?;

        let id = match index_table.get(key)? {
            Some(id) => id.value().to_string(),
            None => return Ok(None),
        };

        match accounts.get(id.as_str())? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }
}
