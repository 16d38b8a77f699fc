//! forum-core - session lifecycle and vote ranking for a forum feed backend
//!
//! This crate provides:
//! - Short-lived access tokens and long-lived, server-side refresh tokens
//!   (HS256 JWT, independent secrets) with logout and logout-everywhere
//! - A per-(user, post) vote ledger with atomic aggregate updates
//! - Reddit-style time-decayed trending ranks
//! - Active expiration of refresh credentials via a background task
//! - redb embedded database (ACID, MVCC, crash-safe)
//! - REST API

pub mod accounts;
pub mod api;
pub mod config;
pub mod expiration;
pub mod ranking;
pub mod session;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;
pub mod voting;

use accounts::Accounts;
use config::Config;
use session::SessionManager;
use storage::Database;
use tokens::TokenService;
use voting::VoteAggregator;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub sessions: SessionManager<Database, Accounts>,
    pub votes: VoteAggregator,
}

impl AppState {
    /// Wire every component around one database handle
    pub fn new(config: Config, db: Database) -> Self {
        let sessions = SessionManager::new(
            TokenService::new(&config.tokens),
            db.clone(),
            Accounts::new(db.clone(), config.accounts.password_hash_cost),
        );
        let votes = VoteAggregator::new(db.clone());
        Self {
            config,
            db,
            sessions,
            votes,
        }
    }
}
