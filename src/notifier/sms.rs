use aws_sdk_sns::Client as SnsClient;
use phonenumber::PhoneNumber;

use super::BallotHandler;
use crate::error::{Error, Result};
use crate::model::{Ballot, BallotId};

/// Builds the URLs a participant follows to vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotLinks {
    base: String,
}

impl BallotLinks {
    /// `base` is the public URL of the service including its mount prefix.
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    pub fn approve(&self, ballot: &BallotId) -> String {
        format!("{}/approve/{ballot}", self.base)
    }

    pub fn deny(&self, ballot: &BallotId) -> String {
        format!("{}/deny/{ballot}", self.base)
    }

    /// The text sent to a participant.
    pub fn message(&self, ballot: &Ballot) -> String {
        format!(
            "{}\nApprove: {}\nDeny: {}",
            ballot.message,
            self.approve(&ballot.id),
            self.deny(&ballot.id)
        )
    }
}

/// Texts ballots to one participant through Amazon SNS.
pub struct SmsHandler {
    client: SnsClient,
    number: PhoneNumber,
    links: BallotLinks,
}

impl SmsHandler {
    pub fn new(client: SnsClient, number: PhoneNumber, links: BallotLinks) -> Self {
        Self {
            client,
            number,
            links,
        }
    }
}

#[rocket::async_trait]
impl BallotHandler for SmsHandler {
    async fn handle(&self, ballot: Ballot) -> Result<()> {
        self.client
            .publish()
            .phone_number(self.number.to_string())
            .message(self.links.message(&ballot))
            .send()
            .await
            .map_err(|e| {
                Error::Notifier(format!(
                    "failed to text ballot to {:?}: {e}",
                    ballot.recipient
                ))
            })?;
        debug!(
            "Texted ballot for election {} to {:?}",
            ballot.election, ballot.recipient
        );
        Ok(())
    }
}
