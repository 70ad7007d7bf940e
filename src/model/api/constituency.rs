use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{CitizenId, ConstituencyId, PartyId},
    db::constituency::{Candidate, Constituency},
};

use super::citizen::require_non_empty;

/// A candidate to stand in a constituency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub party_id: PartyId,
    pub citizen_id: CitizenId,
}

impl From<CandidateSpec> for Candidate {
    fn from(spec: CandidateSpec) -> Self {
        Self {
            party_id: spec.party_id,
            citizen_id: spec.citizen_id,
        }
    }
}

impl From<Candidate> for CandidateSpec {
    fn from(candidate: Candidate) -> Self {
        Self {
            party_id: candidate.party_id,
            citizen_id: candidate.citizen_id,
        }
    }
}

/// Check a slate of candidates has at most one per party, and no citizen standing twice.
pub fn validate_candidates(candidates: &[CandidateSpec]) -> Result<()> {
    let mut parties = HashSet::new();
    let mut citizens = HashSet::new();
    for candidate in candidates {
        if !parties.insert(candidate.party_id) {
            return Err(Error::bad_request(format!(
                "Party {} has more than one candidate",
                candidate.party_id
            )));
        }
        if !citizens.insert(candidate.citizen_id) {
            return Err(Error::bad_request(format!(
                "Citizen {} is standing more than once",
                candidate.citizen_id
            )));
        }
    }
    Ok(())
}

/// A constituency to create or replace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstituencySpec {
    pub name: String,
    pub districts: Vec<String>,
    #[serde(default)]
    pub candidates: Vec<CandidateSpec>,
}

impl ConstituencySpec {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        if self.districts.is_empty() {
            return Err(Error::bad_request(format!(
                "Constituency '{}' covers no districts",
                self.name
            )));
        }
        for district in &self.districts {
            require_non_empty("districts", district)?;
        }
        validate_candidates(&self.candidates)
    }

    pub fn into_constituency(self, id: ConstituencyId) -> Constituency {
        Constituency {
            id,
            name: self.name,
            districts: self.districts,
            candidates: self.candidates.into_iter().map(Candidate::from).collect(),
        }
    }
}

/// A constituency, as presented to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstituencyDescription {
    pub id: ConstituencyId,
    pub name: String,
    pub districts: Vec<String>,
    pub candidates: Vec<CandidateSpec>,
}

impl From<Constituency> for ConstituencyDescription {
    fn from(constituency: Constituency) -> Self {
        Self {
            id: constituency.id,
            name: constituency.name,
            districts: constituency.districts,
            candidates: constituency
                .candidates
                .into_iter()
                .map(CandidateSpec::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl ConstituencySpec {
        pub fn example(candidates: Vec<CandidateSpec>) -> Self {
            Self {
                name: "North Ward".to_string(),
                districts: vec!["Northfield".to_string(), "Hillside".to_string()],
                candidates,
            }
        }
    }
}
