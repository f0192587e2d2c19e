use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sns::{
    config::{Credentials, Region},
    Client as SnsClient,
};
use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::uri::Origin,
    Build, Orbit, Rocket,
};
use serde::Deserialize;

use crate::{
    authority::{CredentialAuthority, JwtAuthority},
    model::ElectionId,
    notifier::{BallotLinks, MailboxNotifier, Notifier, SmsHandler},
    service::{QuorumService, SendPolicy},
    storage::{ensure_indexes_exist, MemStorage, MongoStorage, Storage},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default)]
    public_url: String,
    #[serde(default = "default_prefix")]
    prefix: String,
    #[serde(default)]
    send_policy: SendPolicy,
    discharge_ttl: u32,
    // secrets
    jwt_secret: String,
}

fn default_prefix() -> String {
    "/".to_string()
}

impl Config {
    /// Where the routes are mounted.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// How to react when some ballots of a new election cannot be sent.
    pub fn send_policy(&self) -> SendPolicy {
        self.send_policy
    }

    /// Valid lifetime of minted discharges.
    pub fn discharge_ttl(&self) -> Duration {
        Duration::seconds(self.discharge_ttl.into())
    }

    /// Secret key used to sign discharges.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Public URL of the mounted routes, without a trailing slash.
    pub fn base_url(&self) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        format!("{}{prefix}", self.public_url.trim_end_matches('/'))
    }

    /// Where a client polls for the outcome of the given election.
    pub fn wait_url(&self, election: &ElectionId) -> String {
        format!("{}/wait/{election}", self.base_url())
    }

    /// Links embedded in the ballots sent to participants.
    pub fn ballot_links(&self) -> BallotLinks {
        BallotLinks::new(self.base_url())
    }
}

#[cfg(test)]
impl Config {
    pub fn example() -> Self {
        Self {
            public_url: "https://quorum.example.com".to_string(),
            prefix: "/quorum".to_string(),
            send_policy: SendPolicy::Strict,
            discharge_ttl: 300,
            jwt_secret: "test secret".to_string(),
        }
    }
}

/// A fairing that loads the application config, mounts the API under the
/// configured prefix, and puts the config in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if let Err(e) = Origin::parse(config.prefix()) {
            error!("Invalid prefix {:?}: {e}", config.prefix());
            return Err(rocket);
        }

        Ok(crate::mount(rocket, config))
    }
}

/// Which storage backend to use.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StorageKind {
    #[default]
    Memory,
    Mongodb,
}

/// Configuration for the storage backend.
#[derive(Deserialize)]
struct StorageConfig {
    #[serde(default)]
    storage: StorageKind,
    // secrets
    db_uri: Option<String>,
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "quorum".to_string()
}

/// A fairing that sets up the configured storage backend and places it into
/// managed state as an `Arc<dyn Storage>`.
pub struct StorageFairing;

#[rocket::async_trait]
impl Fairing for StorageFairing {
    fn info(&self) -> Info {
        Info {
            name: "Storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StorageConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load storage config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: Arc<dyn Storage> = match config.storage {
            StorageKind::Memory => {
                info!("Using in-memory storage, elections will not survive a restart");
                Arc::new(MemStorage::new())
            }
            StorageKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set to use MongoDB storage");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(&config.db_name);
                if let Err(e) = ensure_indexes_exist(&db).await {
                    error!("Failed to connect to database: {e}");
                    return Err(rocket);
                }
                info!("...database connection online!");
                Arc::new(MongoStorage::new(&db))
            }
        };

        Ok(rocket.manage(store))
    }
}

/// Configuration for the notifier and its participants.
#[derive(Deserialize)]
struct NotifierConfig {
    #[serde(default = "default_mailbox_capacity")]
    mailbox_capacity: usize,
    /// Seconds to wait for space in a full mailbox.
    #[serde(default = "default_send_timeout")]
    send_timeout: u64,
    /// Participant names and the phone numbers their ballots are texted to.
    #[serde(default)]
    participants: HashMap<String, String>,
}

fn default_mailbox_capacity() -> usize {
    16
}

fn default_send_timeout() -> u64 {
    5
}

/// Configuration for the AWS connection.
#[derive(Deserialize)]
struct AwsConfig {
    // non-secrets
    aws_region: String,
    aws_access_key_id: String,
    // secrets
    aws_secret_access_key: String,
}

/// A fairing that loads the participant list, registers an SMS delivery
/// worker for each participant, and places the notifier into managed state.
/// On shutdown it drains every mailbox.
///
/// This fairing depends on [`ConfigFairing`] for the ballot links, and so
/// must be attached after it.
pub struct NotifierFairing;

#[rocket::async_trait]
impl Fairing for NotifierFairing {
    fn info(&self) -> Info {
        Info {
            name: "Notifier",
            kind: Kind::Ignite | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<NotifierConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load notifier config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let aws = match rocket.figment().extract::<AwsConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load AWS config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let links = match rocket.state::<Config>() {
            Some(config) => config.ballot_links(),
            None => {
                error!("Application config was not available when registering participants");
                return Err(rocket);
            }
        };

        // Construct the connection.
        let aws_config = SdkConfig::builder()
            .region(Region::new(aws.aws_region))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                aws.aws_access_key_id,
                aws.aws_secret_access_key,
                None,
                None,
                "rocket config",
            )))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let client = SnsClient::new(&aws_config);
        info!("Loaded Amazon SNS config");

        // Register every participant.
        let notifier = MailboxNotifier::new(
            config.mailbox_capacity,
            StdDuration::from_secs(config.send_timeout),
        );
        for (name, number) in config.participants {
            let number = match phonenumber::parse(None, &number) {
                Ok(number) => number,
                Err(e) => {
                    error!("Invalid phone number for participant {name:?}: {e}");
                    return Err(rocket);
                }
            };
            let handler = SmsHandler::new(client.clone(), number, links.clone());
            notifier.register(name, handler).await;
        }

        Ok(rocket.manage(Arc::new(notifier)))
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        if let Some(notifier) = rocket.state::<Arc<MailboxNotifier>>() {
            info!("Draining ballot mailboxes...");
            notifier.close().await;
            info!("...mailboxes drained");
        }
    }
}

/// A fairing that assembles the [`QuorumService`] from the storage and
/// notifier in managed state, and manages it in turn.
///
/// Must be attached after [`ConfigFairing`], [`StorageFairing`] and
/// [`NotifierFairing`].
pub struct ServiceFairing;

#[rocket::async_trait]
impl Fairing for ServiceFairing {
    fn info(&self) -> Info {
        Info {
            name: "Quorum Service",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (Some(config), Some(store), Some(notifier)) = (
            rocket.state::<Config>(),
            rocket.state::<Arc<dyn Storage>>(),
            rocket.state::<Arc<MailboxNotifier>>(),
        ) else {
            error!("Service components were not available in managed state");
            return Err(rocket);
        };

        let authority: Arc<dyn CredentialAuthority> = Arc::new(JwtAuthority::new(
            config.jwt_secret(),
            config.discharge_ttl(),
        ));
        let notifier: Arc<dyn Notifier> = notifier.clone();
        let service = QuorumService::new(store.clone(), notifier, authority, config.send_policy());
        info!("Quorum service ready, send policy {:?}", config.send_policy());

        Ok(rocket.manage(service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls() {
        let config = Config::example();
        let id = ElectionId::from("election-id");
        assert_eq!(
            config.wait_url(&id),
            "https://quorum.example.com/quorum/wait/election-id"
        );

        let root = Config {
            public_url: String::new(),
            prefix: "/".to_string(),
            ..Config::example()
        };
        assert_eq!(root.wait_url(&id), "/wait/election-id");
    }

    #[test]
    fn extract_from_figment() {
        let figment = rocket::figment::Figment::from(rocket::Config::debug_default())
            .merge(("prefix", "/quorum"))
            .merge(("send_policy", "quorum"))
            .merge(("discharge_ttl", 60))
            .merge(("jwt_secret", "sekrit"));
        let config = figment.extract::<Config>().unwrap();
        assert_eq!(config.prefix(), "/quorum");
        assert_eq!(config.send_policy(), SendPolicy::Quorum);
        assert_eq!(config.discharge_ttl(), Duration::seconds(60));

        let storage = figment.extract::<StorageConfig>().unwrap();
        assert_eq!(storage.storage, StorageKind::Memory);
        assert_eq!(storage.db_name, "quorum");

        let notifier = figment.extract::<NotifierConfig>().unwrap();
        assert_eq!(notifier.mailbox_capacity, 16);
        assert!(notifier.participants.is_empty());
    }
}
