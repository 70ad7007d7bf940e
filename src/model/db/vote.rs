use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::ledger::VoterToken;
use crate::model::common::{ConstituencyId, ElectionId, PartyId};

/// A single recorded vote. Never stores the voter's raw identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub election_id: ElectionId,
    pub constituency_id: ConstituencyId,
    pub party_id: PartyId,
    pub voter_token: VoterToken,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(
        election_id: ElectionId,
        constituency_id: ConstituencyId,
        party_id: PartyId,
        voter_token: VoterToken,
    ) -> Self {
        Self {
            election_id,
            constituency_id,
            party_id,
            voter_token,
            // Millisecond precision, as stored.
            cast_at: bson::DateTime::now().to_chrono(),
        }
    }

    /// A filter matching any vote by the same voter in the same election and constituency.
    pub fn voter_filter(&self) -> Document {
        doc! {
            "election_id": self.election_id,
            "constituency_id": self.constituency_id,
            "voter_token": self.voter_token.as_str(),
        }
    }
}
