use log::debug;
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

pub const CITIZEN_ID_COUNTER: &str = "citizen_id";
pub const PARTY_ID_COUNTER: &str = "party_id";
pub const CONSTITUENCY_ID_COUNTER: &str = "constituency_id";
pub const ELECTION_ID_COUNTER: &str = "election_id";

const ALL_COUNTERS: [&str; 4] = [
    CITIZEN_ID_COUNTER,
    PARTY_ID_COUNTER,
    CONSTITUENCY_ID_COUNTER,
    ELECTION_ID_COUNTER,
];

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| {
                Error::Status(
                    Status::InternalServerError,
                    format!("Failed to find counter with ID {id}"),
                )
            })?;
        Ok(counter.next)
    }
}

/// Ensure every ID counter exists, starting new ones at 1.
///
/// This operation is idempotent, and never resets an existing counter.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> std::result::Result<(), DbError> {
    debug!("Ensuring ID counters exist");
    let upsert = UpdateOptions::builder().upsert(true).build();
    for id in ALL_COUNTERS {
        counters
            .update_one(
                doc! { "_id": id },
                doc! { "$setOnInsert": { "next": 1 } },
                upsert.clone(),
            )
            .await?;
    }
    Ok(())
}
