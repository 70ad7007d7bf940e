#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
mod scheduled_task;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing, FaceAuthFairing};
use ledger::LedgerFairing;
use logging::LoggerFairing;

/// Build the server, connecting to the database named in the config.
pub fn build() -> Rocket<Build> {
    rocket_with(rocket::build(), DatabaseFairing::default())
}

/// Build the server around an existing database connection.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: model::mongodb::Store) -> Rocket<Build> {
    // Each test database gets its own image directory.
    let image_dir = std::path::Path::new("target/images").join(store.db().name());
    let figment = rocket::Config::figment().merge(("image_dir", image_dir));
    rocket_with(rocket::custom(figment), DatabaseFairing::with_store(store))
}

/// Fairings run in attachment order: later ones need the state earlier ones manage.
fn rocket_with(rocket: Rocket<Build>, database: DatabaseFairing) -> Rocket<Build> {
    rocket
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(FaceAuthFairing)
        .attach(database)
        .attach(LedgerFairing)
        .mount("/", api::routes())
}
