use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub accounts_deleted: u64,
    pub posts_deleted: u64,
    pub refresh_tokens_deleted: u64,
    pub votes_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    match state.db.purge_all() {
        Ok(stats) => {
            tracing::warn!(
                accounts = stats.accounts,
                posts = stats.posts,
                refresh_tokens = stats.refresh_tokens,
                votes = stats.votes,
                "Purged all data"
            );
            Ok(JSend::success(PurgeResponse {
                accounts_deleted: stats.accounts,
                posts_deleted: stats.posts,
                refresh_tokens_deleted: stats.refresh_tokens,
                votes_deleted: stats.votes,
            }))
        }
        Err(e) => Err(ApiError::internal(format!("Failed to purge data: {e}"))),
    }
}
