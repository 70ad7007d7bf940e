//! The voting core: casting votes, moving elections through their lifecycle,
//! and tallying and ranking the results.

mod closer;
mod lifecycle;
mod results;
mod tally;
mod token;
mod vote;

use std::sync::Arc;

use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};

use closer::ElectionClosers;
use lifecycle::LifecycleLocks;

pub use lifecycle::LifecycleError;
pub use token::VoterToken;
pub use vote::VoteError;

use crate::{config::Config, model::mongodb::Store};

/// Everything needed to run elections. Cloning shares the same locks and closers.
#[derive(Clone)]
pub struct Ledger {
    store: Store,
    locks: LifecycleLocks,
    closers: ElectionClosers,
    token_key: Arc<[u8]>,
}

impl Ledger {
    /// Create a ledger deriving voter tokens under the given secret key.
    pub fn new(store: Store, token_key: &[u8]) -> Self {
        Self {
            store,
            locks: LifecycleLocks::default(),
            closers: ElectionClosers::default(),
            token_key: Arc::from(token_key),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// A fairing that places a [`Ledger`] into managed state, and schedules
/// closers for all running timed elections during Rocket ignition.
/// This fairing depends on the [`Store`] and [`Config`] being available in managed state,
/// and so must be attached after the fairings responsible for those.
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Vote Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (store, config) = match (rocket.state::<Store>(), rocket.state::<Config>()) {
            (Some(store), Some(config)) => (store, config),
            _ => {
                error!("Database and config must be available before the ledger");
                return Err(rocket);
            }
        };
        let ledger = Ledger::new(store.clone(), config.voter_token_secret());

        info!("Scheduling election closers...");
        if let Err(e) = ledger.closers.schedule_elections(&ledger).await {
            error!("Failed to schedule election closers: {e}");
            return Err(rocket);
        }
        info!("...election closers scheduled!");

        Ok(rocket.manage(ledger))
    }
}
