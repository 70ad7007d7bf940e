use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{self, serde_helpers::chrono_datetime_as_bson_datetime};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{ConstituencyId, ElectionId, ElectionState},
    mongodb::optional_datetime,
};

/// An election, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: ElectionId,
    pub name: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// Minutes after starting at which the election closes by itself.
    pub time_limit: Option<u32>,
    pub state: ElectionState,
    pub constituencies: Vec<ConstituencyId>,
    #[serde(default, with = "optional_datetime")]
    pub started_at: Option<DateTime<Utc>>,
    /// When a timed election is due to close. Set when it starts.
    #[serde(default, with = "optional_datetime")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_datetime")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Election {
    /// A new election, not yet started.
    pub fn new(
        id: ElectionId,
        name: String,
        time_limit: Option<u32>,
        constituencies: Vec<ConstituencyId>,
    ) -> Self {
        Self {
            id,
            name,
            created_at: bson::DateTime::now().to_chrono(),
            time_limit,
            state: ElectionState::Created,
            constituencies,
            started_at: None,
            ends_at: None,
            ended_at: None,
        }
    }

    /// When this election should close if started at the given time.
    pub fn closing_time(&self, started_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.time_limit
            .map(|minutes| started_at + Duration::minutes(minutes.into()))
    }
}
