use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{PostAggregate, Vote};
use super::tables::*;

/// Result of applying one cast inside the store
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    /// Vote row and aggregate were written together
    Applied { aggregate: PostAggregate, delta: i64 },
    /// The voter's stored value already equals the cast; nothing was written
    NoChange,
    PostNotFound,
}

pub(crate) fn vote_key(post_id: &str, voter_user_id: &str) -> String {
    format!("{post_id}/{voter_user_id}")
}

/// Move the voter out of their old up/down tally and into the new one
fn adjust_tallies(aggregate: &mut PostAggregate, old_value: Option<i8>, new_value: i8) {
    match old_value {
        Some(1) => aggregate.votes_up = aggregate.votes_up.saturating_sub(1),
        Some(-1) => aggregate.votes_down = aggregate.votes_down.saturating_sub(1),
        _ => {}
    }
    match new_value {
        1 => aggregate.votes_up += 1,
        -1 => aggregate.votes_down += 1,
        _ => {}
    }
}

impl Database {
    // ========================================================================
    // Vote ledger
    // ========================================================================

    /// Apply a vote and the matching aggregate increment in one write
    /// transaction.
    ///
    /// The prior vote, the vote row write and the `vote_count` increment all
    /// happen under the single redb writer, so concurrent casts on the same
    /// post serialize and none of their deltas are lost. `rank_for` receives
    /// the post-increment `vote_count` and returns the new rank.
    pub fn apply_vote<F>(
        &self,
        voter_user_id: &str,
        post_id: &str,
        value: i8,
        now: DateTime<Utc>,
        rank_for: F,
    ) -> Result<VoteOutcome, DatabaseError>
    where
        F: FnOnce(i64) -> f64,
    {
        let write_txn = self.begin_write()?;
        let key = vote_key(post_id, voter_user_id);

        let outcome = {
            let mut posts = write_txn.open_table(POSTS)?;
            let post: Option<PostAggregate> = posts
                .get(post_id)?
                .map(|data| rmp_serde::from_slice(data.value()))
                .transpose()?;

            match post {
                None => VoteOutcome::PostNotFound,
                Some(mut aggregate) => {
                    let mut votes = write_txn.open_table(VOTES)?;
                    let existing: Option<Vote> = votes
                        .get(key.as_str())?
                        .map(|data| rmp_serde::from_slice(data.value()))
                        .transpose()?;

                    let old_value = existing.as_ref().map(|v| v.value);
                    if old_value == Some(value) {
                        VoteOutcome::NoChange
                    } else {
                        let delta = i64::from(value) - i64::from(old_value.unwrap_or(0));

                        let vote = Vote {
                            post_id: post_id.to_string(),
                            updated_at: now,
                            value,
                            voter_user_id: voter_user_id.to_string(),
                        };
                        let data = rmp_serde::to_vec_named(&vote)?;
                        votes.insert(key.as_str(), data.as_slice())?;

                        aggregate.vote_count += delta;
                        adjust_tallies(&mut aggregate, old_value, value);
                        aggregate.rank = rank_for(aggregate.vote_count);
                        let data = rmp_serde::to_vec_named(&aggregate)?;
                        posts.insert(post_id, data.as_slice())?;

                        VoteOutcome::Applied { aggregate, delta }
                    }
                }
            }
        };

        match outcome {
            VoteOutcome::Applied { .. } => write_txn.commit()?,
            _ => write_txn.abort()?,
        }
        Ok(outcome)
    }

    /// Get a voter's stored vote on a post
    pub fn get_vote(
        &self,
        voter_user_id: &str,
        post_id: &str,
    ) -> Result<Option<Vote>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(VOTES)?;

        match table.get(vote_key(post_id, voter_user_id).as_str())? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Sum of stored vote values for a post, by range scan over the ledger
    pub fn sum_votes(&self, post_id: &str) -> Result<i64, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(VOTES)?;

        // Keys are "{post_id}/{voter}"; '0' is the byte after '/'
        let start = format!("{post_id}/");
        let end = format!("{post_id}0");

        let mut sum = 0i64;
        for entry in table.range(start.as_str()..end.as_str())? {
            let (_, value) = entry?;
            let vote: Vote = rmp_serde::from_slice(value.value())?;
            sum += i64::from(vote.value);
        }
        Ok(sum)
    }
}
