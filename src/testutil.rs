//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use crate::accounts::Accounts;
use crate::config::{AccountConfig, Config, NodeConfig, TokenConfig, MIN_HASH_COST};
use crate::session::SessionManager;
use crate::storage::models::{Account, PostAggregate, RefreshCredential};
use crate::storage::Database;
use crate::tokens::TokenService;
use crate::AppState;

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard. The caller must
/// keep the `TempDir` alive for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// A minimal `Config` for unit tests: short access TTL, cheapest bcrypt cost.
pub fn test_config() -> Config {
    let mut tokens = TokenConfig::with_secrets("test-access-secret", "test-refresh-secret");
    tokens.access_ttl_seconds = 60;
    Config {
        accounts: AccountConfig {
            password_hash_cost: MIN_HASH_COST,
        },
        node: NodeConfig {
            bind_address: "127.0.0.1:8080".to_string(),
            data_dir: "/tmp/test".to_string(),
        },
        test_mode: false,
        tokens,
    }
}

/// Build a full `Arc<AppState>` around the given database.
pub fn test_state(db: Database) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), db))
}

/// A session manager over the given database using [`test_config`].
pub fn test_sessions(db: &Database) -> SessionManager<Database, Accounts> {
    let config = test_config();
    SessionManager::new(
        TokenService::new(&config.tokens),
        db.clone(),
        Accounts::new(db.clone(), config.accounts.password_hash_cost),
    )
}

/// Create a `RefreshCredential` with token `tok_{id}` owned by `user`.
pub fn make_credential(id: &str, user: &str) -> RefreshCredential {
    let now = Utc::now();
    RefreshCredential {
        expires_at: now + chrono::Duration::days(365),
        issued_at: now,
        owner_user_id: user.to_string(),
        token_value: format!("tok_{id}"),
    }
}

/// Create a zero-vote `PostAggregate` with the given id.
pub fn make_post(id: &str) -> PostAggregate {
    PostAggregate {
        created_at: Utc::now(),
        post_id: id.to_string(),
        rank: 0.0,
        vote_count: 0,
        votes_down: 0,
        votes_up: 0,
    }
}

/// Create an `Account` named `name` with email `{name}@example.com`.
pub fn make_account(name: &str) -> Account {
    Account {
        created_at: Utc::now(),
        email: format!("{name}@example.com"),
        id: format!("id-{name}"),
        password_hash: "not-a-real-hash".to_string(),
        username: name.to_string(),
    }
}
