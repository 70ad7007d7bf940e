use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CitizenId, ConstituencyId, ElectionId, PartyId},
    db::vote::Vote,
};

/// A citizen's choice of party in one constituency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub election_id: ElectionId,
    pub constituency_id: ConstituencyId,
    pub party_id: PartyId,
}

/// Confirmation that a vote was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub election_id: ElectionId,
    pub constituency_id: ConstituencyId,
    pub party_id: PartyId,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            election_id: vote.election_id,
            constituency_id: vote.constituency_id,
            party_id: vote.party_id,
            cast_at: vote.cast_at,
        }
    }
}

/// One line of a ballot paper: a candidate standing for a party in a constituency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotEntry {
    pub constituency_id: ConstituencyId,
    pub constituency_name: String,
    pub party_id: PartyId,
    pub party_name: String,
    /// URL of the party logo.
    pub party_logo: Option<String>,
    pub candidate_id: CitizenId,
    pub candidate_name: String,
}
