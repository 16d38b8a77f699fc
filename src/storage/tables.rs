use redb::TableDefinition;

/// Refresh credentials: token value -> RefreshCredential (msgpack)
pub const REFRESH_TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("refresh_tokens");

/// Secondary index: user_id -> Vec<token value> (for logout-all and device listing)
pub const USER_REFRESH_TOKENS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("user_refresh_tokens");

/// Expiration index: "{expires_at_ms:020}:{token}" -> token value
pub const REFRESH_TOKEN_EXPIRY: TableDefinition<&str, &str> =
    TableDefinition::new("refresh_token_expiry");

/// Votes: "{post_id}/{voter_user_id}" -> Vote (msgpack)
pub const VOTES: TableDefinition<&str, &[u8]> = TableDefinition::new("votes");

/// Post aggregates: post_id -> PostAggregate (msgpack)
pub const POSTS: TableDefinition<&str, &[u8]> = TableDefinition::new("posts");

/// Accounts: user_id -> Account (msgpack)
pub const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

/// Unique index: normalized username -> user_id
pub const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

/// Unique index: normalized email -> user_id
pub const EMAILS: TableDefinition<&str, &str> = TableDefinition::new("emails");
