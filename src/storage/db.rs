use chrono::{DateTime, Utc};
use redb::{
    Database as RedbDatabase, ReadTransaction, ReadableTable, TableDefinition, Value,
    WriteTransaction,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// Handle to the embedded store. Cheap to clone; all clones share one file.
#[derive(Clone)]
pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("forum-core.redb");
        let db = RedbDatabase::create(db_path)?;

        // Create tables if they don't exist so read transactions never miss one
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(REFRESH_TOKENS)?;
            let _ = write_txn.open_table(USER_REFRESH_TOKENS)?;
            let _ = write_txn.open_table(REFRESH_TOKEN_EXPIRY)?;
            let _ = write_txn.open_table(VOTES)?;
            let _ = write_txn.open_table(POSTS)?;
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(USERNAMES)?;
            let _ = write_txn.open_table(EMAILS)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction.
    ///
    /// redb admits one writer at a time, so everything read and written
    /// inside a single write transaction is atomic with respect to every
    /// other writer.
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    // ========================================================================
    // Admin operations
    // ========================================================================

    /// Purge all data - for testing only
    pub fn purge_all(&self) -> Result<PurgeStats, DatabaseError> {
        let write_txn = self.begin_write()?;
        let stats = PurgeStats {
            refresh_tokens: clear_table(&write_txn, REFRESH_TOKENS)?,
            votes: clear_table(&write_txn, VOTES)?,
            posts: clear_table(&write_txn, POSTS)?,
            accounts: clear_table(&write_txn, ACCOUNTS)?,
        };
        clear_table(&write_txn, USER_REFRESH_TOKENS)?;
        clear_table(&write_txn, REFRESH_TOKEN_EXPIRY)?;
        clear_table(&write_txn, USERNAMES)?;
        clear_table(&write_txn, EMAILS)?;
        write_txn.commit()?;
        Ok(stats)
    }
}

/// Remove every row of a string-keyed table, returning how many were removed
fn clear_table<V: Value + 'static>(
    write_txn: &WriteTransaction,
    definition: TableDefinition<'static, &'static str, V>,
) -> Result<u64, DatabaseError> {
    let mut table = write_txn.open_table(definition)?;
    let keys: Vec<String> = table
        .iter()?
        .map(|r| r.map(|(k, _)| k.value().to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    for key in &keys {
        table.remove(key.as_str())?;
    }
    Ok(keys.len() as u64)
}

/// Build an expiration index key that sorts chronologically
pub(crate) fn expiry_key(expires_at: &DateTime<Utc>, token: &str) -> String {
    format!("{:020}:{}", expires_at.timestamp_millis().max(0), token)
}

/// Extract the millisecond timestamp from an expiration index key
pub(crate) fn expiry_key_ms(key: &str) -> Option<i64> {
    key.split_once(':').and_then(|(ms, _)| ms.parse().ok())
}

/// Statistics from a purge operation
#[derive(Debug, Default)]
pub struct PurgeStats {
    pub accounts: u64,
    pub posts: u64,
    pub refresh_tokens: u64,
    pub votes: u64,
}
