use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{ConstituencyId, ElectionId, ElectionState},
    db::election::Election,
};

use super::{
    citizen::require_non_empty,
    constituency::{validate_candidates, CandidateSpec, ConstituencyDescription, ConstituencySpec},
};

/// An election to create, along with its new constituencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    /// Minutes after starting at which the election closes by itself.
    pub time_limit: Option<u32>,
    pub constituencies: Vec<ConstituencySpec>,
}

impl ElectionSpec {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        if self.constituencies.is_empty() {
            return Err(Error::bad_request("An election needs at least one constituency"));
        }
        self.constituencies
            .iter()
            .try_for_each(ConstituencySpec::validate)
    }
}

/// New candidates for one of an election's constituencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstituencyCandidates {
    pub id: ConstituencyId,
    pub candidates: Vec<CandidateSpec>,
}

/// Changes to an election that has not started yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionUpdate {
    pub name: String,
    pub time_limit: Option<u32>,
    pub constituencies: Vec<ConstituencyCandidates>,
}

impl ElectionUpdate {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        if self.constituencies.is_empty() {
            return Err(Error::bad_request("An election needs at least one constituency"));
        }
        self.constituencies
            .iter()
            .try_for_each(|c| validate_candidates(&c.candidates))
    }

    pub fn constituency_ids(&self) -> Vec<ConstituencyId> {
        self.constituencies.iter().map(|c| c.id).collect()
    }
}

/// An election's top-level details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: ElectionId,
    pub name: String,
    pub state: ElectionState,
    pub created_at: DateTime<Utc>,
    pub time_limit: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            name: election.name,
            state: election.state,
            created_at: election.created_at,
            time_limit: election.time_limit,
            started_at: election.started_at,
            ends_at: election.ends_at,
            ended_at: election.ended_at,
        }
    }
}

/// An election with its constituencies, as presented to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    #[serde(flatten)]
    pub election: ElectionSummary,
    pub constituencies: Vec<ConstituencyDescription>,
}
