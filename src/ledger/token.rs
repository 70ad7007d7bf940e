use std::fmt::Display;

use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// An irreversible stand-in for a voter's identity.
///
/// The same voter always maps to the same token under the same key, so it can
/// be used to detect double voting without storing who voted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterToken(String);

impl VoterToken {
    /// Derive the token for a raw voter identifier under the server's secret key.
    pub fn derive(raw_voter_id: &str, key: &[u8]) -> Self {
        let mut hmac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
        hmac.update(raw_voter_id.as_bytes());
        Self(HEXLOWER.encode(&hmac.finalize().into_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VoterToken {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}
