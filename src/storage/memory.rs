use std::collections::HashMap;

use rocket::tokio::sync::Mutex;

use super::{Storage, Vote};
use crate::error::{Error, Result};
use crate::model::{Ballot, BallotId, Election, ElectionId};

#[derive(Default)]
struct Maps {
    elections: HashMap<ElectionId, Election>,
    ballots: HashMap<BallotId, Ballot>,
}

/// Ephemeral in-memory storage. A single lock guards both maps, so every
/// operation is linearizable.
#[derive(Default)]
pub struct MemStorage {
    maps: Mutex<Maps>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl Storage for MemStorage {
    async fn add(&self, election: Election, ballots: Vec<Ballot>) -> Result<()> {
        let mut maps = self.maps.lock().await;
        for ballot in ballots {
            maps.ballots.insert(ballot.id.clone(), ballot);
        }
        maps.elections.insert(election.id.clone(), election);
        Ok(())
    }

    async fn cast(&self, ballot: &BallotId, vote: Vote) -> Result<()> {
        let mut maps = self.maps.lock().await;
        let ballot = maps
            .ballots
            .remove(ballot)
            .ok_or_else(|| Error::not_found("ballot"))?;
        let election = maps
            .elections
            .get_mut(&ballot.election)
            .ok_or_else(|| Error::not_found("election"))?;
        match vote {
            Vote::Approve => election.approvals += 1,
            Vote::Deny => election.denials += 1,
        }
        trace!("Counted {vote:?} towards election {}", ballot.election);
        Ok(())
    }

    async fn election(&self, id: &ElectionId) -> Result<Election> {
        self.maps
            .lock()
            .await
            .elections
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("election"))
    }

    async fn close(&self, id: &ElectionId) -> Result<()> {
        let mut maps = self.maps.lock().await;
        maps.elections.remove(id);
        maps.ballots.retain(|_, ballot| ballot.election != *id);
        Ok(())
    }
}
