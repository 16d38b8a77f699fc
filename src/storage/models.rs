use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted refresh credential. One per logged-in device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshCredential {
    /// When the refresh envelope stops verifying
    pub expires_at: DateTime<Utc>,
    /// When the credential was issued
    pub issued_at: DateTime<Utc>,
    /// The user the credential belongs to
    pub owner_user_id: String,
    /// The signed refresh envelope itself (globally unique)
    pub token_value: String,
}

/// A single voter's vote on a single post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub post_id: String,
    /// Last time the value changed
    pub updated_at: DateTime<Utc>,
    /// -1, 0 or 1
    pub value: i8,
    pub voter_user_id: String,
}

/// The vote-related slice of a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostAggregate {
    pub created_at: DateTime<Utc>,
    pub post_id: String,
    /// Trending score, recomputed whenever `vote_count` changes
    pub rank: f64,
    /// Net sum of all vote values on the post
    pub vote_count: i64,
    /// Number of voters currently at -1
    #[serde(default)]
    pub votes_down: u64,
    /// Number of voters currently at +1
    #[serde(default)]
    pub votes_up: u64,
}

/// A registered account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub created_at: DateTime<Utc>,
    /// Normalized (lowercase, no whitespace)
    pub email: String,
    pub id: String,
    /// bcrypt hash of the password
    pub password_hash: String,
    /// Normalized (lowercase, no whitespace)
    pub username: String,
}
