mod accounts;
mod credentials;
pub mod db;
pub mod models;
mod posts;
mod tables;
mod votes;

pub use accounts::AccountConflict;
pub use credentials::{CredentialError, CredentialStore};
pub use db::{Database, DatabaseError, PurgeStats};
pub use tables::*;
pub use votes::VoteOutcome;
