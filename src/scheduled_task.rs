use std::future::Future;

use chrono::{DateTime, Utc};
use rocket::tokio::{self, task::JoinHandle, time::Duration};

/// A task scheduled for a specific point in the future.
/// It will automatically execute at that point unless cancelled first.
pub struct ScheduledTask<T> {
    handle: JoinHandle<T>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    /// Schedule the given task to execute at time `run_at`.
    /// If `run_at` is in the past, the task will execute immediately.
    pub fn new<Fut>(task: Fut, run_at: DateTime<Utc>) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let sleep_duration = datetime_to_duration(run_at);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(sleep_duration).await;
            task.await
        });
        Self { handle }
    }

    /// Cancel the task. Returns true iff it had already completed before we could cancel it.
    pub async fn cancel(self) -> bool {
        self.handle.abort();
        self.handle.await.is_ok()
    }
}

/// Convert a `DateTime` into a duration from the current instant.
/// A `DateTime` in the past will produce a duration of zero.
fn datetime_to_duration(datetime: DateTime<Utc>) -> Duration {
    let target_timestamp = datetime.timestamp_millis();
    let now_timestamp = Utc::now().timestamp_millis();
    let time_diff = u64::try_from(target_timestamp - now_timestamp).unwrap_or(0);
    Duration::from_millis(time_diff)
}
