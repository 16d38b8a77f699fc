use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{vote_error, PaginationParams};
use crate::api::extract::AuthenticatedUser;
use crate::api::response::{ApiError, AppJson, AppQuery, JSend, JSendPaginated, Pagination};
use crate::storage::models::PostAggregate;
use crate::voting::VoteError;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

/// Left untyped so that every malformed value is reported as an invalid vote
#[derive(Debug, Deserialize, Serialize)]
pub struct CastVoteRequest {
    #[serde(default)]
    pub value: serde_json::Value,
}

impl CastVoteRequest {
    fn vote_value(&self) -> Result<i64, VoteError> {
        self.value.as_i64().ok_or(VoteError::InvalidVoteValue)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyVoteResponse {
    pub post_id: String,
    /// -1, 0 or 1; 0 when the caller never voted
    pub value: i8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub created_at: String,
    pub post_id: String,
    pub rank: f64,
    pub vote_count: i64,
    pub votes_down: u64,
    pub votes_up: u64,
}

impl From<PostAggregate> for PostResponse {
    fn from(post: PostAggregate) -> Self {
        PostResponse {
            created_at: post.created_at.to_rfc3339(),
            post_id: post.post_id,
            rank: post.rank,
            vote_count: post.vote_count,
            votes_down: post.votes_down,
            votes_up: post.votes_up,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<(StatusCode, Json<JSend<PostResponse>>), ApiError> {
    let post_id = uuid::Uuid::new_v4().to_string();
    let post = state
        .votes
        .create_post(&post_id, Utc::now())
        .map_err(vote_error)?;

    tracing::info!(post_id = %post_id, user_id = %user.user_id, "Created post");
    Ok(JSend::created(post.into()))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<PostResponse>>, ApiError> {
    let post = state.votes.get_post(&id).map_err(vote_error)?;
    Ok(JSend::success(post.into()))
}

pub async fn trending(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<Json<JSendPaginated<PostResponse>>, ApiError> {
    params.validate()?;

    let (posts, total) = state
        .votes
        .trending(params.limit as usize, params.offset as usize)
        .map_err(vote_error)?;

    Ok(JSendPaginated::success(
        posts.into_iter().map(PostResponse::from).collect(),
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

pub async fn cast_vote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: AuthenticatedUser,
    AppJson(req): AppJson<CastVoteRequest>,
) -> Result<Json<JSend<PostResponse>>, ApiError> {
    let value = req.vote_value().map_err(vote_error)?;
    let post = state
        .votes
        .cast_vote(&user.user_id, &id, value)
        .map_err(vote_error)?;
    Ok(JSend::success(post.into()))
}

pub async fn my_vote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: AuthenticatedUser,
) -> Result<Json<JSend<MyVoteResponse>>, ApiError> {
    state.votes.get_post(&id).map_err(vote_error)?;
    let vote = state
        .votes
        .vote_of(&user.user_id, &id)
        .map_err(vote_error)?;

    Ok(JSend::success(MyVoteResponse {
        post_id: id,
        value: vote.map_or(0, |v| v.value),
    }))
}
