//! Bearer-token authentication for handlers.
//!
//! Verification runs to completion before the handler body executes, so a
//! handler never observes an unverified or missing user id.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;

use super::handlers::session_error;
use super::response::ApiError;
use crate::AppState;

/// The user id carried by a verified access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("No access token provided"))?;

        let user_id = state.sessions.authenticate(token).map_err(session_error)?;
        Ok(AuthenticatedUser { user_id })
    }
}
