use serde::{Deserialize, Serialize};

use crate::model::common::{ConstituencyId, ElectionId, PartyId};

/// The number of votes a party received in one constituency of an ended election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub election_id: ElectionId,
    pub constituency_id: ConstituencyId,
    pub party_id: PartyId,
    pub votes: u64,
}
