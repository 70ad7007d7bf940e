use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::{CitizenId, PartyId},
    db::party::Party,
};

use super::{
    citizen::{require_non_empty, CitizenDescription},
    image::image_url,
};

/// A party to register. The president is always a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartySpec {
    pub name: String,
    /// Base64-encoded logo.
    pub logo: Option<String>,
    pub president: CitizenId,
    #[serde(default)]
    pub members: Vec<CitizenId>,
}

impl PartySpec {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)
    }

    /// The president and members, without repeats.
    pub fn all_members(&self) -> Vec<CitizenId> {
        let mut members = vec![self.president];
        for member in &self.members {
            if !members.contains(member) {
                members.push(*member);
            }
        }
        members
    }
}

/// Changes to a party. The new president must already be a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyUpdate {
    pub name: String,
    pub president: CitizenId,
    pub logo: Option<String>,
}

impl PartyUpdate {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)
    }
}

/// Request to add a citizen to a party.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MembershipRequest {
    pub party_id: PartyId,
    pub citizen_id: CitizenId,
}

/// A party, with its members, as presented to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDescription {
    pub id: PartyId,
    pub name: String,
    /// URL of the logo.
    pub logo: Option<String>,
    pub president: CitizenId,
    pub members: Vec<CitizenDescription>,
}

impl PartyDescription {
    pub fn new(party: Party, members: Vec<CitizenDescription>) -> Self {
        Self {
            id: party.id,
            name: party.name,
            logo: party.logo.as_deref().map(image_url),
            president: party.president,
            members,
        }
    }
}
