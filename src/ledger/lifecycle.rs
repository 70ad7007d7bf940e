use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use log::info;
use mongodb::{
    bson::{self, doc},
    error::Error as DbError,
};
use rocket::tokio::sync::{Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use thiserror::Error;

use crate::model::{
    common::{ElectionId, ElectionState},
    db::election::Election,
    mongodb::u32_id_filter,
};

use super::Ledger;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Election {0} not found")]
    NotFound(ElectionId),
    #[error("Election {election_id} is {from} and cannot become {to}")]
    InvalidTransition {
        election_id: ElectionId,
        from: ElectionState,
        to: ElectionState,
    },
    #[error("Election {election_id} is {state} and not accepting votes")]
    NotAcceptingVotes {
        election_id: ElectionId,
        state: ElectionState,
    },
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Per-election locks ordering votes against state transitions.
///
/// Votes hold an election's lock shared while they check that it is running and
/// record themselves. Starting and ending hold it exclusively. So a vote either
/// lands before the election ends and is counted, or sees it ended and is rejected.
#[derive(Clone, Default)]
pub struct LifecycleLocks {
    locks: Arc<Mutex<HashMap<ElectionId, Arc<RwLock<()>>>>>,
}

impl LifecycleLocks {
    async fn lock_for(&self, election_id: ElectionId) -> Arc<RwLock<()>> {
        self.locks
            .lock()
            .await
            .entry(election_id)
            .or_default()
            .clone()
    }

    pub async fn shared(&self, election_id: ElectionId) -> OwnedRwLockReadGuard<()> {
        self.lock_for(election_id).await.read_owned().await
    }

    pub async fn exclusive(&self, election_id: ElectionId) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(election_id).await.write_owned().await
    }

    /// Drop the lock of an election that can no longer change state.
    ///
    /// Callers still holding or awaiting the old lock finish on it, and then
    /// find the election ended.
    pub async fn forget(&self, election_id: ElectionId) {
        self.locks.lock().await.remove(&election_id);
    }

    #[cfg(test)]
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

impl Ledger {
    /// Open an election for voting.
    ///
    /// Elections with a time limit are scheduled to close once it runs out.
    pub async fn start_election(&self, election_id: ElectionId) -> Result<Election, LifecycleError> {
        // Only elections that exist and could start get a lock.
        ensure_transition(&self.election(election_id).await?, ElectionState::Started)?;
        let _exclusive = self.locks.exclusive(election_id).await;
        let election = self.election(election_id).await?;
        ensure_transition(&election, ElectionState::Started)?;

        let started_at = Utc::now();
        let ends_at = election.closing_time(started_at);
        let filter = doc! {
            "_id": election_id,
            "state": ElectionState::Created,
        };
        let update = doc! {
            "$set": {
                "state": ElectionState::Started,
                "started_at": bson::DateTime::from_chrono(started_at),
                "ends_at": ends_at.map(bson::DateTime::from_chrono),
            }
        };
        let result = self
            .store
            .coll::<Election>()
            .update_one(filter, update, None)
            .await?;
        if result.modified_count != 1 {
            // Someone else moved it first.
            return Err(self.transition_error(election_id, ElectionState::Started).await);
        }

        if let Some(ends_at) = ends_at {
            self.closers.schedule(self.clone(), election_id, ends_at).await;
        }
        info!("Started election {election_id}");
        self.election(election_id).await
    }

    /// Close an election and tally its votes.
    pub async fn end_election(&self, election_id: ElectionId) -> Result<Election, LifecycleError> {
        let election = self.close_election(election_id).await?;
        self.closers.cancel(election_id).await;
        Ok(election)
    }

    /// Move a running election to `Ended` and aggregate its votes, as one transaction.
    pub(super) async fn close_election(
        &self,
        election_id: ElectionId,
    ) -> Result<Election, LifecycleError> {
        ensure_transition(&self.election(election_id).await?, ElectionState::Ended)?;
        let _exclusive = self.locks.exclusive(election_id).await;
        let election = self.election(election_id).await?;
        ensure_transition(&election, ElectionState::Ended)?;

        let mut session = self.store.start_transaction().await?;
        let filter = doc! {
            "_id": election_id,
            "state": ElectionState::Started,
        };
        let update = doc! {
            "$set": {
                "state": ElectionState::Ended,
                "ended_at": bson::DateTime::from_chrono(Utc::now()),
            }
        };
        let result = self
            .store
            .coll::<Election>()
            .update_one_with_session(filter, update, None, &mut session)
            .await?;
        if result.modified_count != 1 {
            session.abort_transaction().await?;
            return Err(self.transition_error(election_id, ElectionState::Ended).await);
        }
        let tallies = self.aggregate_in(election_id, &mut session).await?;
        session.commit_transaction().await?;
        self.locks.forget(election_id).await;

        let total: u64 = tallies.iter().map(|tally| tally.votes).sum();
        info!(
            "Ended election {election_id}: {total} votes in {} tallies",
            tallies.len()
        );
        self.election(election_id).await
    }

    async fn election(&self, election_id: ElectionId) -> Result<Election, LifecycleError> {
        self.store
            .coll::<Election>()
            .find_one(u32_id_filter(election_id), None)
            .await?
            .ok_or(LifecycleError::NotFound(election_id))
    }

    /// Explain why an election could not move to `to`, based on its current state.
    async fn transition_error(&self, election_id: ElectionId, to: ElectionState) -> LifecycleError {
        match self.election(election_id).await {
            Ok(election) => LifecycleError::InvalidTransition {
                election_id,
                from: election.state,
                to,
            },
            Err(err) => err,
        }
    }
}

fn ensure_transition(election: &Election, to: ElectionState) -> Result<(), LifecycleError> {
    if election.state.can_become(to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition {
            election_id: election.id,
            from: election.state,
            to,
        })
    }
}
