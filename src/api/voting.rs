use std::collections::HashMap;

use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    error::Result,
    ledger::{Ledger, LifecycleError},
    model::{
        api::{
            auth::AuthToken,
            election::ElectionSummary,
            image::image_url,
            vote::{BallotEntry, VoteReceipt, VoteRequest},
        },
        common::{ElectionId, ElectionState},
        db::{
            citizen::Citizen, constituency::Constituency, election::Election, party::Party,
        },
        mongodb::Store,
    },
};

use super::common::election_by_id;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, get_ongoing_elections, get_ballot]
}

#[post("/votes", data = "<request>", format = "json")]
async fn cast_vote(
    token: AuthToken<Citizen>,
    request: Json<VoteRequest>,
    ledger: &State<Ledger>,
) -> Result<Json<VoteReceipt>> {
    let vote = ledger
        .cast_vote(
            request.election_id,
            request.constituency_id,
            request.party_id,
            token.subject(),
        )
        .await?;
    Ok(Json(vote.into()))
}

#[get("/voting/elections")]
async fn get_ongoing_elections(store: &State<Store>) -> Result<Json<Vec<ElectionSummary>>> {
    let elections: Vec<ElectionSummary> = store
        .coll::<Election>()
        .find(doc! { "state": ElectionState::Started }, None)
        .await?
        .map_ok(ElectionSummary::from)
        .try_collect()
        .await?;
    Ok(Json(elections))
}

/// The candidates a voter from the given district can choose between.
#[get("/voting/constituencies/<election_id>/<district>")]
async fn get_ballot(
    election_id: ElectionId,
    district: &str,
    store: &State<Store>,
) -> Result<Json<Vec<BallotEntry>>> {
    let election = election_by_id(&store.coll(), election_id).await?;
    if !election.state.accepts_votes() {
        return Err(LifecycleError::NotAcceptingVotes {
            election_id,
            state: election.state,
        }
        .into());
    }

    let filter = doc! {
        "_id": { "$in": &election.constituencies },
        "districts": district,
    };
    let constituencies: Vec<Constituency> = store
        .coll::<Constituency>()
        .find(filter, None)
        .await?
        .try_collect()
        .await?;

    let candidates = constituencies.iter().flat_map(|c| c.candidates.iter());
    let party_ids: Vec<_> = candidates.clone().map(|c| c.party_id).collect();
    let citizen_ids: Vec<_> = candidates.map(|c| c.citizen_id).collect();
    let parties: HashMap<_, _> = store
        .coll::<Party>()
        .find(doc! { "_id": { "$in": party_ids } }, None)
        .await?
        .map_ok(|party| (party.id, party))
        .try_collect()
        .await?;
    let names: HashMap<_, _> = store
        .coll::<Citizen>()
        .find(doc! { "_id": { "$in": citizen_ids } }, None)
        .await?
        .map_ok(|citizen| (citizen.id, citizen.name))
        .try_collect()
        .await?;

    let mut ballot = Vec::new();
    for constituency in &election.constituencies {
        let Some(constituency) = constituencies.iter().find(|c| c.id == *constituency) else {
            continue;
        };
        for candidate in &constituency.candidates {
            let party = parties.get(&candidate.party_id);
            ballot.push(BallotEntry {
                constituency_id: constituency.id,
                constituency_name: constituency.name.clone(),
                party_id: candidate.party_id,
                party_name: party
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| format!("Party {}", candidate.party_id)),
                party_logo: party.and_then(|p| p.logo.as_deref()).map(image_url),
                candidate_id: candidate.citizen_id,
                candidate_name: names
                    .get(&candidate.citizen_id)
                    .cloned()
                    .unwrap_or_else(|| format!("Citizen {}", candidate.citizen_id)),
            });
        }
    }
    Ok(Json(ballot))
}
