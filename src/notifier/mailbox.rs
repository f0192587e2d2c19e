use std::collections::HashMap;
use std::time::Duration;

use rocket::tokio::{
    self,
    sync::{mpsc, RwLock},
    task::JoinHandle,
    time::timeout,
};

use super::{BallotHandler, Notifier};
use crate::error::{Error, Result};
use crate::model::Ballot;

/// One recipient's delivery queue and the worker consuming it.
struct Mailbox {
    sender: mpsc::Sender<Ballot>,
    worker: JoinHandle<()>,
}

impl Mailbox {
    /// Stop accepting ballots. The worker keeps going until the queue is
    /// empty; await the returned handle to know when it has.
    fn retire(self) -> JoinHandle<()> {
        drop(self.sender);
        self.worker
    }
}

/// An in-process notifier with one bounded FIFO mailbox per registered
/// recipient.
///
/// Ballots for the same recipient are handed to its handler strictly in
/// the order they were sent. Registering a recipient again retires the old
/// mailbox: everything already queued on it is still delivered, by the old
/// handler, before the new handler sees its first ballot.
pub struct MailboxNotifier {
    mailboxes: RwLock<HashMap<String, Mailbox>>,
    capacity: usize,
    send_timeout: Duration,
}

impl MailboxNotifier {
    pub fn new(capacity: usize, send_timeout: Duration) -> Self {
        Self {
            mailboxes: Default::default(),
            capacity: capacity.max(1),
            send_timeout,
        }
    }

    /// Attach `handler` as the delivery worker for `recipient`.
    pub async fn register<H>(&self, recipient: impl Into<String>, handler: H)
    where
        H: BallotHandler,
    {
        let recipient = recipient.into();
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut mailboxes = self.mailboxes.write().await;
        let previous = mailboxes.remove(&recipient).map(Mailbox::retire);
        if previous.is_some() {
            debug!("Re-registering {recipient:?}, draining its old mailbox first");
        }
        let worker = tokio::spawn(deliver(recipient.clone(), receiver, handler, previous));
        mailboxes.insert(recipient, Mailbox { sender, worker });
    }

    /// Stop accepting ballots for `recipient`. Already-queued ballots are
    /// still delivered. Returns whether the recipient was registered.
    pub async fn unregister(&self, recipient: &str) -> bool {
        let mailbox = self.mailboxes.write().await.remove(recipient);
        mailbox.map(Mailbox::retire).is_some()
    }

    /// Unregister every recipient and wait for all queued ballots to be
    /// handed to their handlers.
    pub async fn close(&self) {
        let mailboxes = std::mem::take(&mut *self.mailboxes.write().await);
        for (recipient, mailbox) in mailboxes {
            if let Err(e) = mailbox.retire().await {
                error!("Delivery worker for {recipient:?} died: {e}");
            }
        }
    }
}

/// Worker loop for one mailbox.
async fn deliver<H: BallotHandler>(
    recipient: String,
    mut receiver: mpsc::Receiver<Ballot>,
    handler: H,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            error!("Previous delivery worker for {recipient:?} died: {e}");
        }
    }
    while let Some(ballot) = receiver.recv().await {
        let election = ballot.election.clone();
        if let Err(e) = handler.handle(ballot).await {
            error!("Error handling ballot for recipient {recipient:?} in election {election}: {e}");
        }
    }
    trace!("Mailbox for {recipient:?} drained");
}

#[rocket::async_trait]
impl Notifier for MailboxNotifier {
    async fn validate_recipient(&self, recipient: &str) -> Result<()> {
        if self.mailboxes.read().await.contains_key(recipient) {
            Ok(())
        } else {
            Err(Error::Notifier(format!("unknown recipient {recipient:?}")))
        }
    }

    async fn send(&self, ballot: Ballot) -> Result<()> {
        // Don't hold the lock while waiting for queue space.
        let sender = self
            .mailboxes
            .read()
            .await
            .get(&ballot.recipient)
            .map(|mailbox| mailbox.sender.clone())
            .ok_or_else(|| Error::Notifier(format!("unknown recipient {:?}", ballot.recipient)))?;
        let recipient = ballot.recipient.clone();
        match timeout(self.send_timeout, sender.send(ballot)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::Notifier(format!(
                "{recipient:?} isn't receiving messages"
            ))),
            Err(_) => Err(Error::Notifier(format!(
                "timed out queueing ballot for {recipient:?}"
            ))),
        }
    }
}
