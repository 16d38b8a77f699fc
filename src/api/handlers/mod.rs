mod admin;
mod auth;
mod posts;

use serde::Deserialize;

use crate::api::response::ApiError;
use crate::session::SessionError;
use crate::voting::VoteError;

/// Shared pagination query parameters for list endpoints
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl PaginationParams {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.limit == 0 {
            return Err(ApiError::bad_request("limit must be greater than 0"));
        }
        if self.limit > MAX_LIMIT {
            return Err(ApiError::bad_request(format!(
                "limit must be at most {MAX_LIMIT}"
            )));
        }
        Ok(())
    }
}

const MAX_LIMIT: u32 = 100;

fn default_limit() -> u32 {
    20
}

pub use admin::{admin_purge, health};
pub use auth::{devices, login, logout, logout_all, me, refresh_token, register};
pub use posts::{cast_vote, create_post, get_post, my_vote, trending};

/// Map a SessionError to an ApiError
pub(crate) fn session_error(e: SessionError) -> ApiError {
    match e {
        SessionError::AccountNotFound | SessionError::BadPassword | SessionError::TokenExpired => {
            ApiError::unauthorized(e.to_string())
        }
        SessionError::TokenTampered | SessionError::TokenNotFound | SessionError::TokenMismatch => {
            ApiError::forbidden(e.to_string())
        }
        SessionError::EmailTaken
        | SessionError::UsernameTaken
        | SessionError::UsernameAndEmailTaken => ApiError::conflict(e.to_string()),
        SessionError::TokensNotSaved(_)
        | SessionError::Accounts(_)
        | SessionError::Credentials(_)
        | SessionError::Signing(_) => {
            tracing::error!(error = %e, "Session operation failed");
            ApiError::internal(e.to_string())
        }
    }
}

/// Map a VoteError to an ApiError
pub(crate) fn vote_error(e: VoteError) -> ApiError {
    match e {
        VoteError::InvalidVoteValue => ApiError::bad_request(e.to_string()),
        VoteError::PostNotFound => ApiError::not_found(e.to_string()),
        VoteError::NoChange | VoteError::PostExists => ApiError::conflict(e.to_string()),
        VoteError::Database(_) => {
            tracing::error!(error = %e, "Vote store operation failed");
            ApiError::internal(e.to_string())
        }
    }
}
