use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::session_error;
use crate::api::extract::AuthenticatedUser;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::session::{SessionError, TokenPair};
use crate::storage::models::{Account, RefreshCredential};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    /// Username or email
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RefreshTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevokedResponse {
    pub revoked: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub created_at: String,
    pub email: String,
    pub id: String,
    pub username: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        AccountResponse {
            created_at: account.created_at.to_rfc3339(),
            email: account.email,
            id: account.id,
            username: account.username,
        }
    }
}

/// One logged-in device. The refresh token itself is never echoed back.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub expires_at: String,
    pub issued_at: String,
}

impl From<RefreshCredential> for DeviceResponse {
    fn from(credential: RefreshCredential) -> Self {
        DeviceResponse {
            expires_at: credential.expires_at.to_rfc3339(),
            issued_at: credential.issued_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<JSend<TokenPair>>), ApiError> {
    validate_register(&req)?;

    // bcrypt hashing is CPU-bound
    let pair = run_blocking(move || {
        state
            .sessions
            .register(&req.username, &req.email, &req.password)
    })
    .await?;

    Ok(JSend::created(pair))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<JSend<TokenPair>>, ApiError> {
    if req.identifier.trim().is_empty() {
        return Err(ApiError::bad_request("identifier is required"));
    }
    if req.password.is_empty() {
        return Err(ApiError::bad_request("password is required"));
    }

    let pair = run_blocking(move || state.sessions.login(&req.identifier, &req.password)).await?;
    Ok(JSend::success(pair))
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RefreshTokenRequest>,
) -> Result<Json<JSend<AccessTokenResponse>>, ApiError> {
    let token = required_token(&req)?;
    let access_token = state.sessions.refresh(token).map_err(session_error)?;
    Ok(JSend::success(AccessTokenResponse { access_token }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RefreshTokenRequest>,
) -> Result<Json<JSend<RevokedResponse>>, ApiError> {
    let token = required_token(&req)?;
    let revoked = state.sessions.logout(token).map_err(session_error)?;
    Ok(JSend::success(RevokedResponse { revoked }))
}

pub async fn logout_all(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RefreshTokenRequest>,
) -> Result<Json<JSend<RevokedResponse>>, ApiError> {
    let token = required_token(&req)?;
    let revoked = state.sessions.logout_all(token).map_err(session_error)?;
    Ok(JSend::success(RevokedResponse { revoked }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<JSend<AccountResponse>>, ApiError> {
    let account = state
        .db
        .get_account(&user.user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Account not found"))?;
    Ok(JSend::success(account.into()))
}

pub async fn devices(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<JSend<Vec<DeviceResponse>>>, ApiError> {
    let devices = state
        .sessions
        .devices(&user.user_id)
        .map_err(session_error)?;
    Ok(JSend::success(
        devices.into_iter().map(DeviceResponse::from).collect(),
    ))
}

// ============================================================================
// Helpers
// ============================================================================

fn validate_register(req: &RegisterRequest) -> Result<(), ApiError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("username is required"));
    }
    // Identifiers containing '@' are resolved as emails at login
    if username.contains('@') {
        return Err(ApiError::bad_request("username must not contain '@'"));
    }
    let email = req.email.trim();
    if email.is_empty() {
        return Err(ApiError::bad_request("email is required"));
    }
    if !email.contains('@') {
        return Err(ApiError::bad_request("email is not valid"));
    }
    if req.password.is_empty() {
        return Err(ApiError::bad_request("password is required"));
    }
    Ok(())
}

fn required_token(req: &RefreshTokenRequest) -> Result<&str, ApiError> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(ApiError::bad_request("token is required"));
    }
    Ok(token)
}

async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, SessionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("Session task failed: {e}")))?
        .map_err(session_error)
}
