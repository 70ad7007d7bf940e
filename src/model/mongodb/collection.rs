use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::{doc, Document},
    error::Error as DbError,
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    admin::{Admin, NewAdmin},
    citizen::Citizen,
    constituency::Constituency,
    election::Election,
    party::{Party, PartyMember},
    tally::Tally,
    vote::Vote,
};

use super::{counter::Counter, Store};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Fails if no [`Store`] is managed.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.guard::<&State<Store>>().await.map(|store| store.coll())
    }
}

// Admin collections
const ADMINS: &str = "admins";
impl MongoCollection for Admin {
    const NAME: &'static str = ADMINS;
}
impl MongoCollection for NewAdmin {
    const NAME: &'static str = ADMINS;
}

impl MongoCollection for Citizen {
    const NAME: &'static str = "citizens";
}

impl MongoCollection for Party {
    const NAME: &'static str = "parties";
}

impl MongoCollection for PartyMember {
    const NAME: &'static str = "party_members";
}

impl MongoCollection for Constituency {
    const NAME: &'static str = "constituencies";
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for Tally {
    const NAME: &'static str = "tallies";
}

impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();
    let unique_index = |keys: Document| {
        IndexModel::builder()
            .keys(keys)
            .options(unique.clone())
            .build()
    };

    Coll::<Admin>::from_db(db)
        .create_index(unique_index(doc! {"username": 1}), None)
        .await?;

    // National IDs identify citizens.
    Coll::<Citizen>::from_db(db)
        .create_index(unique_index(doc! {"nid": 1}), None)
        .await?;

    Coll::<Party>::from_db(db)
        .create_index(unique_index(doc! {"name": 1}), None)
        .await?;

    // A citizen belongs to at most one party.
    Coll::<PartyMember>::from_db(db)
        .create_index(unique_index(doc! {"citizen_id": 1}), None)
        .await?;

    // One vote per voter per constituency per election.
    Coll::<Vote>::from_db(db)
        .create_index(
            unique_index(doc! {"election_id": 1, "constituency_id": 1, "voter_token": 1}),
            None,
        )
        .await?;

    Coll::<Tally>::from_db(db)
        .create_index(
            unique_index(doc! {"election_id": 1, "constituency_id": 1, "party_id": 1}),
            None,
        )
        .await?;

    Ok(())
}
