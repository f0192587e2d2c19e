use std::time::Duration;

use rocket::tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::timeout,
};

use super::BallotHandler;
use crate::error::{Error, Result};
use crate::model::{Ballot, BallotId};

/// How long tests wait for a ballot before giving up.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[rocket::async_trait]
impl BallotHandler for UnboundedSender<Ballot> {
    async fn handle(&self, ballot: Ballot) -> Result<()> {
        self.send(ballot)
            .map_err(|_| Error::Notifier("inbox dropped".to_string()))
    }
}

/// Collects delivered ballots in-process, so tests can vote with them.
pub struct Inbox {
    receiver: UnboundedReceiver<Ballot>,
    unclaimed: Vec<Ballot>,
}

impl Inbox {
    /// A handler to register with a notifier, and the inbox it delivers to.
    pub fn new() -> (UnboundedSender<Ballot>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let inbox = Self {
            receiver,
            unclaimed: Vec::new(),
        };
        (sender, inbox)
    }

    /// The next ballot, in delivery order.
    pub async fn next(&mut self) -> Ballot {
        if !self.unclaimed.is_empty() {
            return self.unclaimed.remove(0);
        }
        timeout(DELIVERY_TIMEOUT, self.receiver.recv())
            .await
            .expect("timed out waiting for a ballot")
            .expect("all handlers dropped")
    }

    /// The next ballot if one has already arrived.
    pub fn try_next(&mut self) -> Option<Ballot> {
        if !self.unclaimed.is_empty() {
            return Some(self.unclaimed.remove(0));
        }
        self.receiver.try_recv().ok()
    }

    /// The next `n` ballots, in delivery order.
    pub async fn take(&mut self, n: usize) -> Vec<Ballot> {
        let mut ballots = Vec::with_capacity(n);
        for _ in 0..n {
            ballots.push(self.next().await);
        }
        ballots
    }

    /// The id of the next ballot addressed to `recipient`. Ballots for other
    /// recipients stay queued.
    pub async fn ballot_for(&mut self, recipient: &str) -> BallotId {
        if let Some(pos) = self.unclaimed.iter().position(|b| b.recipient == recipient) {
            return self.unclaimed.remove(pos).id;
        }
        loop {
            let ballot = timeout(DELIVERY_TIMEOUT, self.receiver.recv())
                .await
                .expect("timed out waiting for a ballot")
                .expect("all handlers dropped");
            if ballot.recipient == recipient {
                return ballot.id;
            }
            self.unclaimed.push(ballot);
        }
    }
}
