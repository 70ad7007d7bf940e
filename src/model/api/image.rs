use std::path::Path;

use data_encoding::BASE64;
use rocket::tokio::fs;

use crate::error::{Error, Result};

/// Kinds of uploaded image, each kept in its own subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    CitizenFace,
    PartyLogo,
}

impl ImageKind {
    fn dir(self) -> &'static str {
        match self {
            Self::CitizenFace => "citizen_images",
            Self::PartyLogo => "party_images",
        }
    }

    /// Where the image of the citizen or party with this ID is kept,
    /// relative to the image directory.
    pub fn path_for(self, owner: u32) -> String {
        format!("{}/{owner}.jpg", self.dir())
    }
}

/// An uploaded image, decoded but not yet written anywhere.
#[derive(Debug)]
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    /// Accepts plain base64 or a `data:` URL.
    pub fn decode(encoded: &str) -> Result<Self> {
        let encoded = match encoded.split_once(";base64,") {
            Some((_, data)) => data,
            None => encoded,
        };
        let bytes = BASE64
            .decode(encoded.trim().as_bytes())
            .map_err(|e| Error::bad_request(format!("Image is not valid base64: {e}")))?;
        if bytes.is_empty() {
            return Err(Error::bad_request("Image is empty"));
        }
        Ok(Self { bytes })
    }

    /// Write the image to `relative` under `image_dir`, replacing any earlier one.
    pub async fn save(&self, image_dir: &Path, relative: &str) -> Result<()> {
        let path = image_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &self.bytes).await?;
        Ok(())
    }
}

/// The URL a stored image is served at.
pub fn image_url(relative: &str) -> String {
    format!("/images/{relative}")
}
