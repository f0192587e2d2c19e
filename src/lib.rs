#[macro_use]
extern crate rocket;
#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod authority;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notifier;
pub mod service;
pub mod storage;

#[cfg(test)]
mod testing;

use config::{Config, ConfigFairing, NotifierFairing, ServiceFairing, StorageFairing};
use logging::LoggerFairing;

/// The server, configured from `Rocket.toml` and the environment. Fairing
/// order matters: each one reads what the previous ones put in managed state.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StorageFairing)
        .attach(NotifierFairing)
        .attach(ServiceFairing)
}

/// Mount the API under the configured prefix and manage the config.
pub(crate) fn mount(rocket: Rocket<Build>, config: Config) -> Rocket<Build> {
    let prefix = config.prefix().to_string();
    rocket.mount(prefix, api::routes()).manage(config)
}
