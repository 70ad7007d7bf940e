use serde::{Deserialize, Serialize};

use crate::model::common::{CitizenId, ConstituencyId, PartyId};

/// A candidate standing for a party in a constituency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub party_id: PartyId,
    pub citizen_id: CitizenId,
}

/// An electoral area, covering one or more districts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constituency {
    #[serde(rename = "_id")]
    pub id: ConstituencyId,
    pub name: String,
    pub districts: Vec<String>,
    /// At most one candidate per party.
    pub candidates: Vec<Candidate>,
}

impl Constituency {
    /// The candidate standing for the given party, if any.
    pub fn candidate_for(&self, party_id: PartyId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.party_id == party_id)
    }
}
