use serde::{Deserialize, Serialize};

use crate::model::common::CitizenId;

/// A registered citizen, eligible to vote and to stand as a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizen {
    #[serde(rename = "_id")]
    pub id: CitizenId,
    pub name: String,
    /// National ID number, unique per citizen.
    pub nid: String,
    pub district: String,
    /// Path of the stored face image, relative to the image directory.
    pub face: Option<String>,
}
