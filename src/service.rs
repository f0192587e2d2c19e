//! The election lifecycle: create, vote, poll, discharge.

use std::sync::Arc;

use serde::Deserialize;

use crate::authority::CredentialAuthority;
use crate::error::{Error, Result};
use crate::model::{Ballot, BallotId, Election, ElectionId, ElectionResult, Policy};
use crate::notifier::Notifier;
use crate::storage::Storage;

/// What to do when some ballots of a new election cannot be sent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendPolicy {
    /// Any failed send fails the election.
    #[default]
    Strict,
    /// Tolerate failed sends while the reachable participants can still
    /// reach the approval threshold.
    Quorum,
}

/// The answer to a poll on an election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Not decided yet, ask again later.
    Pending,
    /// Vetoed. This will never change.
    Denied,
    /// Approved; the discharge has been minted and the election closed.
    Discharged(Vec<u8>),
}

/// Runs elections on behalf of a credential authority.
pub struct QuorumService {
    store: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    authority: Arc<dyn CredentialAuthority>,
    send_policy: SendPolicy,
}

impl QuorumService {
    pub fn new(
        store: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        authority: Arc<dyn CredentialAuthority>,
        send_policy: SendPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            authority,
            send_policy,
        }
    }

    /// Start an election for the caveat `caveat_id`, whose condition encodes
    /// the quorum policy, and send every participant their ballot.
    ///
    /// Nothing is stored unless the policy is valid and every participant is
    /// a known recipient. If ballots cannot be sent as the send policy
    /// requires, the election is closed again before returning the error.
    pub async fn create_election(&self, caveat_id: &str, condition: &str) -> Result<ElectionId> {
        let policy = Policy::from_condition(condition)?;
        policy.validate()?;
        for recipient in &policy.participants {
            self.notifier.validate_recipient(recipient).await?;
        }

        let election = Election::new(ElectionId::generate(), caveat_id, policy);
        let ballots = election
            .policy
            .participants
            .iter()
            .map(|recipient| {
                Ballot::new(election.id.clone(), recipient, &election.policy.message)
            })
            .collect::<Vec<_>>();
        let id = election.id.clone();
        let approvals_required = election.policy.approvals_required as usize;
        let participants = ballots.len();
        self.store.add(election, ballots.clone()).await?;

        let mut sent = 0;
        for ballot in ballots {
            let recipient = ballot.recipient.clone();
            match self.notifier.send(ballot).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!("Failed to send ballot for election {id} to {recipient:?}: {e}");
                    if self.send_policy == SendPolicy::Strict {
                        self.abandon(&id).await;
                        return Err(e);
                    }
                }
            }
        }
        if sent < approvals_required {
            self.abandon(&id).await;
            return Err(Error::Notifier(format!(
                "only {sent} of {participants} ballots sent, {approvals_required} approvals required"
            )));
        }

        info!("Created election {id}, {sent} of {participants} ballots sent");
        Ok(id)
    }

    /// Close an election that could not be started properly.
    async fn abandon(&self, id: &ElectionId) {
        if let Err(e) = self.store.close(id).await {
            error!("Failed to close abandoned election {id}: {e}");
        }
    }

    /// Poll the election. On approval the discharge is minted and the
    /// election closed; if minting fails the election stays approved so the
    /// caller can retry.
    pub async fn wait(&self, id: &ElectionId) -> Result<WaitOutcome> {
        let election = self.store.election(id).await?;
        match election.result() {
            ElectionResult::Pending => Ok(WaitOutcome::Pending),
            ElectionResult::Denied => Ok(WaitOutcome::Denied),
            ElectionResult::Approved => {
                let discharge = self.authority.mint_discharge(&election.caveat_id).await?;
                self.store.close(&election.id).await?;
                info!("Election {id} approved, discharge issued");
                Ok(WaitOutcome::Discharged(discharge))
            }
        }
    }

    pub async fn approve(&self, ballot: &BallotId) -> Result<()> {
        self.store.approve(ballot).await
    }

    pub async fn deny(&self, ballot: &BallotId) -> Result<()> {
        self.store.deny(ballot).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::authority::JwtAuthority;
    use crate::notifier::{Inbox, MailboxNotifier};
    use crate::storage::MemStorage;
    use crate::testing::{condition, FlakyAuthority, RECIPIENTS};

    struct Fixture {
        service: QuorumService,
        store: Arc<MemStorage>,
        notifier: Arc<MailboxNotifier>,
        inbox: Inbox,
    }

    async fn fixture(send_policy: SendPolicy, authority: Arc<dyn CredentialAuthority>) -> Fixture {
        let store = Arc::new(MemStorage::new());
        let notifier = Arc::new(MailboxNotifier::new(16, Duration::from_secs(1)));
        let (tx, inbox) = Inbox::new();
        for recipient in RECIPIENTS {
            notifier.register(recipient, tx.clone()).await;
        }
        let service = QuorumService::new(store.clone(), notifier.clone(), authority, send_policy);
        Fixture {
            service,
            store,
            notifier,
            inbox,
        }
    }

    fn jwt() -> Arc<JwtAuthority> {
        Arc::new(JwtAuthority::new("test secret", ChronoDuration::minutes(5)))
    }

    #[rocket::async_test]
    async fn reference_scenario() {
        let mut f = fixture(SendPolicy::Strict, jwt()).await;
        let id = f
            .service
            .create_election("caveat-1", &condition(2, &["alice", "bob"]))
            .await
            .unwrap();
        assert_eq!(f.service.wait(&id).await.unwrap(), WaitOutcome::Pending);

        let alice = f.inbox.ballot_for("alice").await;
        let bob = f.inbox.ballot_for("bob").await;

        f.service.approve(&alice).await.unwrap();
        assert_eq!(f.service.wait(&id).await.unwrap(), WaitOutcome::Pending);

        assert!(matches!(
            f.service.approve(&alice).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(f.service.wait(&id).await.unwrap(), WaitOutcome::Pending);

        f.service.approve(&bob).await.unwrap();
        let discharge = match f.service.wait(&id).await.unwrap() {
            WaitOutcome::Discharged(discharge) => discharge,
            other => panic!("expected a discharge, got {other:?}"),
        };
        assert_eq!(jwt().verify(&discharge).unwrap().caveat_id, "caveat-1");

        // Closed once discharged.
        assert!(matches!(f.service.wait(&id).await, Err(Error::NotFound(_))));
    }

    #[rocket::async_test]
    async fn ballots_carry_policy_message() {
        let mut f = fixture(SendPolicy::Strict, jwt()).await;
        let id = f
            .service
            .create_election("caveat-1", &condition(1, &["alice", "bob"]))
            .await
            .unwrap();
        let ballots = f.inbox.take(2).await;
        assert!(ballots.iter().all(|b| b.election == id));
        assert!(ballots.iter().all(|b| b.message == "let the build through?"));
        assert_ne!(ballots[0].id, ballots[1].id);
    }

    #[rocket::async_test]
    async fn veto_is_final() {
        let mut f = fixture(SendPolicy::Strict, jwt()).await;
        let id = f
            .service
            .create_election("caveat-1", &condition(2, &["alice", "bob"]))
            .await
            .unwrap();
        let alice = f.inbox.ballot_for("alice").await;
        let bob = f.inbox.ballot_for("bob").await;

        f.service.deny(&alice).await.unwrap();
        f.service.approve(&bob).await.unwrap();
        assert_eq!(f.service.wait(&id).await.unwrap(), WaitOutcome::Denied);
        // Denied elections are not closed; polling keeps saying no.
        assert_eq!(f.service.wait(&id).await.unwrap(), WaitOutcome::Denied);
    }

    #[rocket::async_test]
    async fn zero_threshold_discharges_immediately() {
        let f = fixture(SendPolicy::Strict, jwt()).await;
        let id = f
            .service
            .create_election("caveat-1", &condition(0, &["alice"]))
            .await
            .unwrap();
        assert!(matches!(
            f.service.wait(&id).await.unwrap(),
            WaitOutcome::Discharged(_)
        ));
    }

    #[rocket::async_test]
    async fn invalid_policies_store_nothing() {
        let f = fixture(SendPolicy::Strict, jwt()).await;
        for bad in [
            condition(3, &["alice", "bob"]),
            condition(0, &[]),
            "not json".to_string(),
        ] {
            assert!(matches!(
                f.service.create_election("caveat-1", &bad).await,
                Err(Error::Validation(_))
            ));
        }
    }

    #[rocket::async_test]
    async fn unknown_participant_aborts_creation() {
        let mut f = fixture(SendPolicy::Strict, jwt()).await;
        let result = f
            .service
            .create_election("caveat-1", &condition(1, &["alice", "mallory"]))
            .await;
        assert!(matches!(result, Err(Error::Notifier(_))));
        // Alice never hears about it.
        assert!(f.inbox.try_next().is_none());
    }

    #[rocket::async_test]
    async fn strict_policy_abandons_on_send_failure() {
        let mut f = fixture(SendPolicy::Strict, jwt()).await;
        // Carol passes validation, then disappears before her ballot goes out.
        let service = QuorumService::new(
            f.store.clone(),
            Arc::new(VanishingRecipient {
                inner: f.notifier.clone(),
                vanishing: "carol",
            }),
            jwt(),
            SendPolicy::Strict,
        );
        let result = service
            .create_election("caveat-1", &condition(1, &["alice", "carol"]))
            .await;
        assert!(matches!(result, Err(Error::Notifier(_))));

        // Alice's ballot went out first, but the election is gone.
        let alice = f.inbox.next().await;
        assert_eq!(alice.recipient, "alice");
        assert!(matches!(
            f.store.election(&alice.election).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.approve(&alice.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn quorum_policy_tolerates_unreachable_minority() {
        let mut f = fixture(SendPolicy::Quorum, jwt()).await;
        let service = QuorumService::new(
            f.store.clone(),
            Arc::new(VanishingRecipient {
                inner: f.notifier.clone(),
                vanishing: "carol",
            }),
            jwt(),
            SendPolicy::Quorum,
        );

        let id = service
            .create_election("caveat-1", &condition(2, &["alice", "bob", "carol"]))
            .await
            .unwrap();
        let alice = f.inbox.ballot_for("alice").await;
        let bob = f.inbox.ballot_for("bob").await;
        service.approve(&alice).await.unwrap();
        service.approve(&bob).await.unwrap();
        assert!(matches!(
            service.wait(&id).await.unwrap(),
            WaitOutcome::Discharged(_)
        ));

        // Without enough reachable participants the election is abandoned.
        let result = service
            .create_election("caveat-2", &condition(3, &["alice", "bob", "carol"]))
            .await;
        assert!(matches!(result, Err(Error::Notifier(_))));
    }

    #[rocket::async_test]
    async fn authority_outage_keeps_election_approved() {
        let authority = Arc::new(FlakyAuthority::new());
        let f = fixture(SendPolicy::Strict, authority.clone()).await;
        let id = f
            .service
            .create_election("caveat-1", &condition(0, &["alice"]))
            .await
            .unwrap();

        assert!(matches!(f.service.wait(&id).await, Err(Error::Authority(_))));
        let election = f.store.election(&id).await.unwrap();
        assert_eq!(election.result(), ElectionResult::Approved);

        authority.recover();
        assert!(matches!(
            f.service.wait(&id).await.unwrap(),
            WaitOutcome::Discharged(_)
        ));
    }

    #[rocket::async_test]
    async fn elections_are_isolated() {
        let mut f = fixture(SendPolicy::Strict, jwt()).await;
        let first = f
            .service
            .create_election("caveat-1", &condition(1, &["alice"]))
            .await
            .unwrap();
        let first_ballot = f.inbox.ballot_for("alice").await;
        let second = f
            .service
            .create_election("caveat-2", &condition(1, &["bob"]))
            .await
            .unwrap();
        assert_ne!(first, second);

        f.service.deny(&first_ballot).await.unwrap();
        assert_eq!(f.service.wait(&first).await.unwrap(), WaitOutcome::Denied);
        assert_eq!(f.service.wait(&second).await.unwrap(), WaitOutcome::Pending);
    }

    /// Validates `vanishing` like any other recipient, but can never
    /// deliver to them.
    struct VanishingRecipient {
        inner: Arc<MailboxNotifier>,
        vanishing: &'static str,
    }

    #[rocket::async_trait]
    impl Notifier for VanishingRecipient {
        async fn validate_recipient(&self, recipient: &str) -> Result<()> {
            self.inner.validate_recipient(recipient).await
        }

        async fn send(&self, ballot: Ballot) -> Result<()> {
            if ballot.recipient == self.vanishing {
                return Err(Error::Notifier(format!(
                    "{:?} isn't receiving messages",
                    ballot.recipient
                )));
            }
            self.inner.send(ballot).await
        }
    }
}
