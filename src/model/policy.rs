use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What constitutes a quorum of approval. Encoded as JSON in the
/// third-party caveat condition addressed to this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// How many participants must approve.
    pub approvals_required: u32,
    /// Who gets a ballot. Duplicates are allowed and each gets its own ballot.
    pub participants: Vec<String>,
    /// Shown to every participant alongside their ballot.
    #[serde(default)]
    pub message: String,
}

impl Policy {
    /// Decode a policy from a caveat condition.
    pub fn from_condition(condition: &str) -> Result<Self> {
        serde_json::from_str(condition)
            .map_err(|e| Error::Validation(format!("invalid caveat {condition:?}: {e}")))
    }

    /// Reject policies that could never be satisfied.
    pub fn validate(&self) -> Result<()> {
        if self.participants.is_empty() {
            return Err(Error::Validation("no recipients specified".to_string()));
        }
        if self.participants.len() < self.approvals_required as usize {
            return Err(Error::Validation(format!(
                "{} recipients will never satisfy {} approver requirement",
                self.participants.len(),
                self.approvals_required
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
impl Policy {
    pub fn example(approvals_required: u32, participants: &[&str]) -> Self {
        Self {
            approvals_required,
            participants: participants.iter().map(|p| p.to_string()).collect(),
            message: "election message".to_string(),
        }
    }
}
