use serde::{Deserialize, Serialize};

use super::id::{BallotId, ElectionId};

/// One participant's outstanding right to vote in one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: BallotId,
    /// The election this ballot counts towards.
    pub election: ElectionId,
    pub recipient: String,
    pub message: String,
}

impl Ballot {
    pub fn new(election: ElectionId, recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: BallotId::generate(),
            election,
            recipient: recipient.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
impl Ballot {
    pub fn example(id: &str, election: &str, recipient: &str) -> Self {
        Self {
            id: BallotId::from(id),
            election: ElectionId::from(election),
            recipient: recipient.to_string(),
            message: "election message".to_string(),
        }
    }
}
