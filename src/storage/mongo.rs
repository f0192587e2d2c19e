use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::ReplaceOptions,
    Collection, Database, IndexModel,
};

use super::{Storage, Vote};
use crate::error::{Error, Result};
use crate::model::{Ballot, BallotId, Election, ElectionId};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for Ballot {
    const NAME: &'static str = "ballots";
}

/// Get a handle on the collection for `T` in the given database.
fn coll<T: MongoCollection>(db: &Database) -> Collection<T> {
    db.collection(T::NAME)
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> std::result::Result<(), DbError> {
    debug!("Ensuring collection indexes exist");
    let by_election = IndexModel::builder().keys(doc! {"election": 1}).build();
    coll::<Ballot>(db).create_index(by_election, None).await?;
    Ok(())
}

/// Storage backed by MongoDB.
///
/// Consistency relies on single-document atomicity: a ballot is claimed by
/// exactly one `find_one_and_delete`, and counters only ever move through
/// `$inc`, so neither needs a transaction.
#[derive(Clone)]
pub struct MongoStorage {
    elections: Collection<Election>,
    ballots: Collection<Ballot>,
}

impl MongoStorage {
    pub fn new(db: &Database) -> Self {
        Self {
            elections: coll(db),
            ballots: coll(db),
        }
    }
}

#[rocket::async_trait]
impl Storage for MongoStorage {
    async fn add(&self, election: Election, ballots: Vec<Ballot>) -> Result<()> {
        // The election goes in first, so any ballot a reader can see
        // already has its election.
        let upsert = ReplaceOptions::builder().upsert(true).build();
        self.elections
            .replace_one(doc! {"_id": election.id.as_str()}, &election, upsert)
            .await?;
        if !ballots.is_empty() {
            self.ballots.insert_many(&ballots, None).await?;
        }
        Ok(())
    }

    async fn cast(&self, ballot: &BallotId, vote: Vote) -> Result<()> {
        let ballot = self
            .ballots
            .find_one_and_delete(doc! {"_id": ballot.as_str()}, None)
            .await?
            .ok_or_else(|| Error::not_found("ballot"))?;
        let counter = match vote {
            Vote::Approve => "approvals",
            Vote::Deny => "denials",
        };
        let result = self
            .elections
            .update_one(
                doc! {"_id": ballot.election.as_str()},
                doc! {"$inc": {counter: 1}},
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(Error::not_found("election"));
        }
        Ok(())
    }

    async fn election(&self, id: &ElectionId) -> Result<Election> {
        self.elections
            .find_one(doc! {"_id": id.as_str()}, None)
            .await?
            .ok_or_else(|| Error::not_found("election"))
    }

    async fn close(&self, id: &ElectionId) -> Result<()> {
        self.elections
            .delete_one(doc! {"_id": id.as_str()}, None)
            .await?;
        // Outstanding ballots can never count again.
        self.ballots
            .delete_many(doc! {"election": id.as_str()}, None)
            .await?;
        Ok(())
    }
}
