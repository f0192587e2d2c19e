//! Delivering ballots to participants.

use crate::error::Result;
use crate::model::Ballot;

mod mailbox;
mod sms;

#[cfg(test)]
mod inbox;

pub use mailbox::MailboxNotifier;
pub use sms::{BallotLinks, SmsHandler};

#[cfg(test)]
pub use inbox::Inbox;

/// Validates and contacts participants.
#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    /// Fail unless ballots can be delivered to `recipient`.
    async fn validate_recipient(&self, recipient: &str) -> Result<()>;

    /// Queue a ballot for delivery to its recipient. Returns once the ballot
    /// is queued, not once it has been delivered.
    async fn send(&self, ballot: Ballot) -> Result<()>;
}

/// Hands a ballot to its participant over some transport.
#[rocket::async_trait]
pub trait BallotHandler: Send + Sync + 'static {
    async fn handle(&self, ballot: Ballot) -> Result<()>;
}
