//! Lookups and checks shared between endpoints.

use std::collections::HashMap;

use mongodb::{
    bson::{doc, Document},
    ClientSession,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::{
        constituency::{CandidateSpec, ConstituencyDescription},
        election::ElectionDescription,
    },
    common::{ConstituencyId, ElectionId, ElectionState},
    db::{
        citizen::Citizen,
        constituency::Constituency,
        election::Election,
        party::{Party, PartyMember},
    },
    mongodb::{u32_id_filter, Coll, Store},
};

/// Fetch an election, or fail with 404.
pub async fn election_by_id(elections: &Coll<Election>, election_id: ElectionId) -> Result<Election> {
    elections
        .find_one(u32_id_filter(election_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

/// Fetch constituencies in the order given, failing with 404 if any is missing.
pub async fn constituencies_by_id(
    constituencies: &Coll<Constituency>,
    ids: &[ConstituencyId],
) -> Result<Vec<Constituency>> {
    let mut found: HashMap<_, _> = constituencies
        .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
        .await?
        .map_ok(|c| (c.id, c))
        .try_collect()
        .await?;
    ids.iter()
        .map(|id| {
            found
                .remove(id)
                .ok_or_else(|| Error::not_found(format!("Constituency {id}")))
        })
        .collect()
}

/// An election along with its constituencies.
pub async fn describe_election(store: &Store, election: Election) -> Result<ElectionDescription> {
    let constituencies = constituencies_by_id(&store.coll(), &election.constituencies).await?;
    Ok(ElectionDescription {
        constituencies: constituencies
            .into_iter()
            .map(ConstituencyDescription::from)
            .collect(),
        election: election.into(),
    })
}

/// Check every candidate is a registered citizen standing for a party they belong to.
pub async fn check_candidates(store: &Store, candidates: &[CandidateSpec]) -> Result<()> {
    let parties = store.coll::<Party>();
    let citizens = store.coll::<Citizen>();
    let members = store.coll::<PartyMember>();
    for candidate in candidates {
        if parties
            .count_documents(u32_id_filter(candidate.party_id), None)
            .await?
            == 0
        {
            return Err(Error::bad_request(format!(
                "Party {} does not exist",
                candidate.party_id
            )));
        }
        if citizens
            .count_documents(u32_id_filter(candidate.citizen_id), None)
            .await?
            == 0
        {
            return Err(Error::bad_request(format!(
                "Citizen {} does not exist",
                candidate.citizen_id
            )));
        }
        let membership = doc! {
            "party_id": candidate.party_id,
            "citizen_id": candidate.citizen_id,
        };
        if members.count_documents(membership, None).await? == 0 {
            return Err(Error::bad_request(format!(
                "Citizen {} is not a member of party {}",
                candidate.citizen_id, candidate.party_id
            )));
        }
    }
    Ok(())
}

/// Fail with 409 if the constituency belongs to an election that has started.
pub async fn ensure_constituency_editable(
    elections: &Coll<Election>,
    constituency_id: ConstituencyId,
) -> Result<()> {
    let count = elections
        .count_documents(started_with(constituency_id), None)
        .await?;
    editable_unless_started(constituency_id, count)
}

/// As [`ensure_constituency_editable`], reading inside the session's transaction.
pub async fn ensure_constituency_editable_in(
    elections: &Coll<Election>,
    constituency_id: ConstituencyId,
    session: &mut ClientSession,
) -> Result<()> {
    let count = elections
        .count_documents_with_session(started_with(constituency_id), None, session)
        .await?;
    editable_unless_started(constituency_id, count)
}

/// Elections past `Created` that include the constituency.
fn started_with(constituency_id: ConstituencyId) -> Document {
    doc! {
        "constituencies": constituency_id,
        "state": { "$ne": ElectionState::Created },
    }
}

fn editable_unless_started(constituency_id: ConstituencyId, started: u64) -> Result<()> {
    if started > 0 {
        return Err(Error::conflict(format!(
            "Constituency {constituency_id} belongs to an election that has started"
        )));
    }
    Ok(())
}
