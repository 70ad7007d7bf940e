use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, trace, warn};
use mongodb::{bson::doc, error::Error as DbError};
use rocket::{
    futures::{
        future::{BoxFuture, FutureExt},
        TryStreamExt,
    },
    tokio::sync::Mutex,
};

use crate::model::{
    common::{ElectionId, ElectionState},
    db::election::Election,
};
use crate::scheduled_task::ScheduledTask;

use super::{LifecycleError, Ledger};

/// Map from election IDs to closer tasks.
type TaskMap = HashMap<ElectionId, ScheduledTask<()>>;

/// How long to wait before retrying a close that failed.
const RETRY_INTERVAL_SECONDS: i64 = 300;

/// Election closers: scheduled tasks that end timed elections when their time runs out.
#[derive(Clone, Default)]
pub struct ElectionClosers {
    tasks: Arc<Mutex<TaskMap>>,
}

impl ElectionClosers {
    /// Does the given election have a closer scheduled?
    pub async fn is_scheduled(&self, election_id: ElectionId) -> bool {
        self.tasks.lock().await.contains_key(&election_id)
    }

    /// Schedule a closer for every running election with a closing time.
    ///
    /// Overdue elections are closed straight away.
    pub async fn schedule_elections(&self, ledger: &Ledger) -> Result<(), DbError> {
        let filter = doc! {
            "state": ElectionState::Started,
            "ends_at": { "$ne": null },
        };
        let running: Vec<Election> = ledger
            .store
            .coll::<Election>()
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        for election in running {
            if let Some(ends_at) = election.ends_at {
                self.schedule(ledger.clone(), election.id, ends_at).await;
            }
        }
        Ok(())
    }

    /// Schedule a closer for the given election.
    /// If one already exists, it will be rescheduled.
    pub async fn schedule(&self, ledger: Ledger, election_id: ElectionId, close_at: DateTime<Utc>) {
        let closer = Self::closer(ledger, election_id, self.tasks.clone());
        // Hold the lock until the task is tracked, so it cannot finish and untrack itself first.
        let mut tasks_locked = self.tasks.lock().await;
        if let Some(task) = tasks_locked.remove(&election_id) {
            task.cancel().await;
        }
        tasks_locked.insert(election_id, ScheduledTask::new(closer, close_at));
        debug!("Election {election_id} will close at {close_at}");
    }

    /// Cancel the closer for the given election, if it has one.
    pub async fn cancel(&self, election_id: ElectionId) {
        let task = self.tasks.lock().await.remove(&election_id);
        // The lock is released before waiting, as the closer needs it too.
        if let Some(task) = task {
            task.cancel().await;
            trace!("Cancelled closer for election {election_id}");
        }
    }

    /// Close the given election, retrying later on failure.
    /// Since this is a recursive async function, we must use `BoxFuture` to
    /// avoid an infinitely-recursive state machine.
    fn closer(
        ledger: Ledger,
        election_id: ElectionId,
        tasks: Arc<Mutex<TaskMap>>,
    ) -> BoxFuture<'static, ()> {
        async move {
            debug!("Running closer for election {election_id}");
            match ledger.close_election(election_id).await {
                Ok(_) => {
                    tasks.lock().await.remove(&election_id);
                    trace!("Closer completed; removed self from list");
                }
                Err(LifecycleError::InvalidTransition { from, .. }) => {
                    // Already ended by hand.
                    tasks.lock().await.remove(&election_id);
                    debug!("Closer for election {election_id} had nothing to do, election is {from}");
                }
                Err(LifecycleError::NotFound(_)) => {
                    tasks.lock().await.remove(&election_id);
                    warn!("Closer for election {election_id} found no such election");
                }
                Err(e) => {
                    error!("Closer for election {election_id} failed, election is still open: {e}");
                    let retry = Self::closer(ledger, election_id, tasks.clone());
                    let retry_time = Utc::now() + Duration::seconds(RETRY_INTERVAL_SECONDS);
                    let mut tasks_locked = tasks.lock().await;
                    tasks_locked.insert(election_id, ScheduledTask::new(retry, retry_time));
                    warn!("Failed closer will be retried in {RETRY_INTERVAL_SECONDS} seconds");
                }
            }
        }
        .boxed()
    }
}
