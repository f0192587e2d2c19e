//! Fixtures shared by tests that need a whole service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rocket::{serde::json::serde_json::json, Build, Rocket};

use crate::authority::{CredentialAuthority, JwtAuthority};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::LoggerFairing;
use crate::notifier::{Inbox, MailboxNotifier};
use crate::service::QuorumService;
use crate::storage::{MemStorage, Storage};

/// Participants registered with every test notifier.
pub const RECIPIENTS: [&str; 3] = ["alice", "bob", "carol"];

/// A caveat condition carrying a quorum policy.
pub fn condition(approvals_required: u32, participants: &[&str]) -> String {
    json!({
        "approvalsRequired": approvals_required,
        "participants": participants,
        "message": "let the build through?",
    })
    .to_string()
}

/// Fails to mint until recovered.
pub struct FlakyAuthority {
    inner: JwtAuthority,
    recovered: AtomicBool,
}

impl FlakyAuthority {
    pub fn new() -> Self {
        Self {
            inner: JwtAuthority::new("test secret", chrono::Duration::minutes(5)),
            recovered: AtomicBool::new(false),
        }
    }

    pub fn recover(&self) {
        self.recovered.store(true, Ordering::SeqCst);
    }
}

#[rocket::async_trait]
impl CredentialAuthority for FlakyAuthority {
    async fn mint_discharge(&self, caveat_id: &str) -> Result<Vec<u8>> {
        if !self.recovered.load(Ordering::SeqCst) {
            return Err(Error::Authority("root key unavailable".to_string()));
        }
        self.inner.mint_discharge(caveat_id).await
    }
}

/// How `#[backend_test(...)]` builds the service under test.
pub struct TestOptions {
    pub config: Config,
    /// Manage an `Arc<FlakyAuthority>` and mint through it.
    pub flaky_authority: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            config: Config::example(),
            flaky_authority: false,
        }
    }
}

impl TestOptions {
    pub fn flaky_authority() -> Self {
        Self {
            flaky_authority: true,
            ..Self::default()
        }
    }
}

/// A Rocket instance over in-memory storage, whose participants all deliver
/// into the returned inbox. Mounted at `/quorum`.
pub async fn rocket_for_tests(options: TestOptions) -> (Rocket<Build>, Inbox) {
    let TestOptions {
        config,
        flaky_authority,
    } = options;
    log4rs_test_utils::test_logging::init_logging_once_for(["quorum_discharger"], None, None);
    let mut rocket = rocket::custom(rocket::Config::debug_default()).attach(LoggerFairing);

    let store: Arc<dyn Storage> = Arc::new(MemStorage::new());
    let notifier = Arc::new(MailboxNotifier::new(16, Duration::from_secs(1)));
    let (sender, inbox) = Inbox::new();
    for recipient in RECIPIENTS {
        notifier.register(recipient, sender.clone()).await;
    }

    let authority: Arc<dyn CredentialAuthority> = if flaky_authority {
        let authority = Arc::new(FlakyAuthority::new());
        rocket = rocket.manage(authority.clone());
        authority
    } else {
        Arc::new(JwtAuthority::new(config.jwt_secret(), config.discharge_ttl()))
    };
    let service = QuorumService::new(
        store.clone(),
        notifier.clone(),
        authority,
        config.send_policy(),
    );

    let rocket = rocket.manage(store).manage(notifier).manage(service);
    (crate::mount(rocket, config), inbox)
}
