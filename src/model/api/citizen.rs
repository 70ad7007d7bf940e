use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::CitizenId,
    db::citizen::Citizen,
};

use super::image::image_url;

/// A citizen to register, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitizenSpec {
    pub name: String,
    pub nid: String,
    pub district: String,
    /// Base64-encoded photo of the citizen's face.
    pub face: String,
}

impl CitizenSpec {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("nid", &self.nid)?;
        require_non_empty("district", &self.district)
    }
}

/// Changes to a citizen's details. The national ID cannot change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitizenUpdate {
    pub name: String,
    pub district: String,
    /// A replacement face photo, if any.
    pub face: Option<String>,
}

impl CitizenUpdate {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("district", &self.district)
    }
}

/// A citizen, as presented to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitizenDescription {
    pub id: CitizenId,
    pub name: String,
    pub nid: String,
    pub district: String,
    /// URL of the face photo.
    pub face: Option<String>,
}

impl From<Citizen> for CitizenDescription {
    fn from(citizen: Citizen) -> Self {
        Self {
            id: citizen.id,
            name: citizen.name,
            nid: citizen.nid,
            district: citizen.district,
            face: citizen.face.as_deref().map(image_url),
        }
    }
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::bad_request(format!("`{field}` must not be empty")))
    } else {
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_rejected() {
        let mut spec = CitizenSpec::example();
        assert!(spec.validate().is_ok());
        spec.nid = "  ".to_string();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn description_links_face() {
        let description = CitizenDescription::from(Citizen::example());
        assert_eq!(
            description.face.as_deref(),
            Some("/images/citizen_images/1.jpg")
        );
    }
}
