use std::path::Path;

#[cfg(not(test))]
use data_encoding::BASE64;
#[cfg(not(test))]
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Faces this similar or less are treated as different people.
pub const SIMILARITY_THRESHOLD: f64 = 0.5;

#[cfg(test)]
pub(crate) const TEST_FACE_IMAGE: &str = "this image matches any citizen in test mode";

/// A citizen's login attempt: their national ID and a photo of their face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitizenLogin {
    pub nid: String,
    /// Base64-encoded image.
    pub image: String,
}

#[derive(Debug, Error)]
pub enum FaceAuthError {
    #[error("Failed to read stored face: {0}")]
    Io(#[from] std::io::Error),
    #[error("Face matching service failed: {0}")]
    Service(#[from] reqwest::Error),
}

/// Body sent to the face matching service.
#[derive(Serialize)]
struct FaceComparison<'a> {
    image1: String,
    image2: &'a str,
}

/// Reply from the face matching service.
#[derive(Deserialize)]
struct FaceSimilarity {
    similarity_index: f64,
}

/// Client for the external face matching service.
pub struct FaceMatcher {
    http: reqwest::Client,
    url: String,
}

impl FaceMatcher {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    /// Does the submitted base64 image show the same person as the stored face image?
    #[cfg(not(test))]
    pub async fn matches(&self, stored_face: &Path, image: &str) -> Result<bool, FaceAuthError> {
        let stored = rocket::tokio::fs::read(stored_face).await?;
        let comparison = FaceComparison {
            image1: BASE64.encode(&stored),
            image2: image,
        };
        let similarity: FaceSimilarity = self
            .http
            .post(&self.url)
            .json(&comparison)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Face similarity index {}", similarity.similarity_index);
        Ok(is_match(similarity.similarity_index))
    }

    /// In test mode, just check the image is the dummy value.
    #[cfg(test)]
    pub async fn matches(&self, _stored_face: &Path, image: &str) -> Result<bool, FaceAuthError> {
        Ok(image == TEST_FACE_IMAGE)
    }
}

fn is_match(similarity_index: f64) -> bool {
    similarity_index > SIMILARITY_THRESHOLD
}
