use serde::{Deserialize, Serialize};

use crate::model::common::{CitizenId, PartyId};

/// A political party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    #[serde(rename = "_id")]
    pub id: PartyId,
    pub name: String,
    /// Path of the stored logo, relative to the image directory.
    pub logo: Option<String>,
    pub president: CitizenId,
}

/// Membership of a citizen in a party. A citizen has at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMember {
    pub party_id: PartyId,
    pub citizen_id: CitizenId,
}
