//! Persistence for elections and their outstanding ballots.
//!
//! Every backend must resolve a ballot at most once, even when approve and
//! deny race on it, and must never lose a counter update when distinct
//! ballots of the same election are resolved concurrently.

use crate::error::Result;
use crate::model::{Ballot, BallotId, Election, ElectionId};

mod memory;
mod mongo;

pub use self::memory::MemStorage;
pub use self::mongo::{ensure_indexes_exist, MongoStorage};

/// Which way a ballot was cast.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Vote {
    Approve,
    Deny,
}

/// The mutation and query surface over elections and ballots.
#[rocket::async_trait]
pub trait Storage: Send + Sync {
    /// Insert an election with all of its ballots, replacing any election
    /// with the same id.
    async fn add(&self, election: Election, ballots: Vec<Ballot>) -> Result<()>;

    /// Consume a ballot and count its vote towards the owning election.
    async fn cast(&self, ballot: &BallotId, vote: Vote) -> Result<()>;

    /// A snapshot of the election.
    async fn election(&self, id: &ElectionId) -> Result<Election>;

    /// Forget the election and any of its ballots still outstanding.
    /// Closing an unknown election is not an error.
    async fn close(&self, id: &ElectionId) -> Result<()>;

    async fn approve(&self, ballot: &BallotId) -> Result<()> {
        self.cast(ballot, Vote::Approve).await
    }

    async fn deny(&self, ballot: &BallotId) -> Result<()> {
        self.cast(ballot, Vote::Deny).await
    }
}
