use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::{id::ElectionId, policy::Policy};

/// An active election in which a quorum is sought for a discharge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: ElectionId,
    /// Opaque reference the credential authority needs to mint the discharge.
    pub caveat_id: String,
    pub policy: Policy,
    pub approvals: u32,
    pub denials: u32,
}

impl Election {
    /// A fresh election with no votes cast.
    pub fn new(id: ElectionId, caveat_id: impl Into<String>, policy: Policy) -> Self {
        Self {
            id,
            caveat_id: caveat_id.into(),
            policy,
            approvals: 0,
            denials: 0,
        }
    }

    /// The current outcome. A single denial vetoes the election no matter
    /// how many approvals have been cast.
    pub fn result(&self) -> ElectionResult {
        if self.denials > 0 {
            ElectionResult::Denied
        } else if self.approvals >= self.policy.approvals_required {
            ElectionResult::Approved
        } else {
            ElectionResult::Pending
        }
    }
}

/// The current outcome of an election.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionResult {
    Pending,
    Approved,
    Denied,
}

impl Display for ElectionResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
impl Election {
    pub fn example(id: &str, approvals_required: u32, participants: &[&str]) -> Self {
        Self::new(
            ElectionId::from(id),
            format!("{id}-caveatid"),
            Policy::example(approvals_required, participants),
        )
    }
}
