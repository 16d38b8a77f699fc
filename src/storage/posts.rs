use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::PostAggregate;
use super::tables::*;

impl Database {
    // ========================================================================
    // Post aggregates
    // ========================================================================

    /// Register a post aggregate. Returns false (and leaves the stored row
    /// alone) if the post id is already taken.
    pub fn put_post(&self, post: &PostAggregate) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let created = {
            let mut table = write_txn.open_table(POSTS)?;
            if table.get(post.post_id.as_str())?.is_some() {
                false
            } else {
                let data = rmp_serde::to_vec_named(post)?;
                table.insert(post.post_id.as_str(), data.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(created)
    }

    /// Get a post aggregate by id
    pub fn get_post(&self, post_id: &str) -> Result<Option<PostAggregate>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(POSTS)?;

        match table.get(post_id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// All post aggregates, highest rank first
    pub fn get_posts_by_rank(&self) -> Result<Vec<PostAggregate>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(POSTS)?;

        let mut posts = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let post: PostAggregate = rmp_serde::from_slice(value.value())?;
            posts.push(post);
        }

        posts.sort_by(|a, b| {
            b.rank
                .total_cmp(&a.rank)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::{make_post, setup_db};

    #[test]
    fn test_put_post_rejects_existing_id() {
        let (db, _temp) = setup_db();

        let mut post = make_post("p1");
        assert!(db.put_post(&post).unwrap());

        post.vote_count = 99;
        assert!(!db.put_post(&post).unwrap());
        assert_eq!(db.get_post("p1").unwrap().unwrap().vote_count, 0);
    }

    #[test]
    fn test_posts_by_rank_descending() {
        let (db, _temp) = setup_db();

        for (id, rank) in [("low", -1.5), ("high", 3.0), ("mid", 0.5)] {
            let mut post = make_post(id);
            post.rank = rank;
            db.put_post(&post).unwrap();
        }

        let ids: Vec<String> = db
            .get_posts_by_rank()
            .unwrap()
            .into_iter()
            .map(|p| p.post_id)
            .collect();
        assert_eq!(ids, ["high", "mid", "low"]);
    }
}
