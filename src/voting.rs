//! Vote aggregation.
//!
//! A cast reads the voter's prior vote, writes the new one, applies the
//! difference to the post's `vote_count` and recomputes its rank, all inside
//! one store write transaction. Either every piece lands or none does.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ranking;
use crate::storage::models::{PostAggregate, Vote};
use crate::storage::{Database, DatabaseError, VoteOutcome};

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("value must be -1, 0, or 1")]
    InvalidVoteValue,
    #[error("vote unchanged")]
    NoChange,
    #[error("post already exists")]
    PostExists,
    #[error("post not found")]
    PostNotFound,
}

/// A validated vote value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteValue {
    Down,
    Neutral,
    Up,
}

impl VoteValue {
    pub fn as_i8(self) -> i8 {
        match self {
            VoteValue::Down => -1,
            VoteValue::Neutral => 0,
            VoteValue::Up => 1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = VoteError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(VoteValue::Down),
            0 => Ok(VoteValue::Neutral),
            1 => Ok(VoteValue::Up),
            _ => Err(VoteError::InvalidVoteValue),
        }
    }
}

/// Applies casts to the vote ledger and post aggregates
#[derive(Clone)]
pub struct VoteAggregator {
    db: Database,
}

impl VoteAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Cast (or change) a vote and return the post's updated aggregate.
    ///
    /// Fails with `InvalidVoteValue` before touching the store, with
    /// `PostNotFound` for unknown posts, and with `NoChange` (nothing
    /// written) when the voter's stored value already equals `new_value`.
    pub fn cast_vote(
        &self,
        voter_user_id: &str,
        post_id: &str,
        new_value: i64,
    ) -> Result<PostAggregate, VoteError> {
        self.cast_vote_at(voter_user_id, post_id, new_value, Utc::now())
    }

    pub fn cast_vote_at(
        &self,
        voter_user_id: &str,
        post_id: &str,
        new_value: i64,
        now: DateTime<Utc>,
    ) -> Result<PostAggregate, VoteError> {
        let value = VoteValue::try_from(new_value)?;

        let outcome = self
            .db
            .apply_vote(voter_user_id, post_id, value.as_i8(), now, |count| {
                ranking::score_at(count, now)
            })?;

        match outcome {
            VoteOutcome::Applied { aggregate, delta } => {
                tracing::debug!(
                    post_id = %post_id,
                    voter = %voter_user_id,
                    delta,
                    vote_count = aggregate.vote_count,
                    "Vote applied"
                );
                Ok(aggregate)
            }
            VoteOutcome::NoChange => Err(VoteError::NoChange),
            VoteOutcome::PostNotFound => Err(VoteError::PostNotFound),
        }
    }

    /// Register a post so it can receive votes. Starts at zero votes, rank 0.
    pub fn create_post(&self, post_id: &str, now: DateTime<Utc>) -> Result<PostAggregate, VoteError> {
        let post = PostAggregate {
            created_at: now,
            post_id: post_id.to_string(),
            rank: ranking::score_at(0, now),
            vote_count: 0,
            votes_down: 0,
            votes_up: 0,
        };
        if !self.db.put_post(&post)? {
            return Err(VoteError::PostExists);
        }
        tracing::debug!(post_id = %post_id, "Registered post aggregate");
        Ok(post)
    }

    pub fn get_post(&self, post_id: &str) -> Result<PostAggregate, VoteError> {
        self.db.get_post(post_id)?.ok_or(VoteError::PostNotFound)
    }

    pub fn vote_of(&self, voter_user_id: &str, post_id: &str) -> Result<Option<Vote>, VoteError> {
        Ok(self.db.get_vote(voter_user_id, post_id)?)
    }

    /// Posts ordered by rank (highest first), with the total count
    pub fn trending(&self, limit: usize, offset: usize) -> Result<(Vec<PostAggregate>, u64), VoteError> {
        let posts = self.db.get_posts_by_rank()?;
        let total = posts.len() as u64;
        Ok((posts.into_iter().skip(offset).take(limit).collect(), total))
    }
}
