use log::info;
use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    ledger::Ledger,
    model::{
        api::{
            auth::AuthToken,
            election::{ElectionDescription, ElectionSpec, ElectionSummary, ElectionUpdate},
            results::{PastElection, ResultEntry},
        },
        common::{ElectionId, ElectionState},
        db::{
            admin::Admin,
            constituency::Constituency,
            election::Election,
        },
        mongodb::{
            u32_id_filter, Coll, Counter, Store, CONSTITUENCY_ID_COUNTER, ELECTION_ID_COUNTER,
        },
    },
};

use super::common::{
    check_candidates, constituencies_by_id, describe_election, election_by_id,
    ensure_constituency_editable_in,
};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        get_upcoming_elections,
        get_past_elections,
        get_election,
        update_election,
        delete_election,
        start_election,
        end_election,
        get_results,
    ]
}

/// Fail with 409 if the election has left the `Created` state.
fn ensure_not_started(election: &Election) -> Result<()> {
    if election.state == ElectionState::Created {
        Ok(())
    } else {
        Err(Error::conflict(format!(
            "Election {} is {} and can no longer be changed",
            election.id, election.state
        )))
    }
}

/// Create an election along with all of its constituencies.
#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    store: &State<Store>,
) -> Result<(Status, Json<ElectionDescription>)> {
    spec.validate()?;
    for constituency in &spec.constituencies {
        check_candidates(store, &constituency.candidates).await?;
    }
    let spec = spec.0;

    let counters = store.coll::<Counter>();
    let mut constituencies = Vec::with_capacity(spec.constituencies.len());
    for constituency in spec.constituencies {
        let id = Counter::next(&counters, CONSTITUENCY_ID_COUNTER).await?;
        constituencies.push(constituency.into_constituency(id));
    }
    let election = Election::new(
        Counter::next(&counters, ELECTION_ID_COUNTER).await?,
        spec.name,
        spec.time_limit,
        constituencies.iter().map(|c| c.id).collect(),
    );

    let mut session = store.start_transaction().await?;
    store
        .coll::<Constituency>()
        .insert_many_with_session(&constituencies, None, &mut session)
        .await?;
    store
        .coll::<Election>()
        .insert_one_with_session(&election, None, &mut session)
        .await?;
    session.commit_transaction().await?;
    info!(
        "Created election {} with {} constituencies",
        election.id,
        constituencies.len()
    );

    Ok((Status::Created, Json(describe_election(store, election).await?)))
}

/// Elections that have not ended yet.
#[get("/elections/upcoming")]
async fn get_upcoming_elections(
    _token: AuthToken<Admin>,
    store: &State<Store>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let filter = doc! { "state": { "$ne": ElectionState::Ended } };
    let elections: Vec<Election> = store
        .coll::<Election>()
        .find(filter, None)
        .await?
        .try_collect()
        .await?;

    let mut descriptions = Vec::with_capacity(elections.len());
    for election in elections {
        descriptions.push(describe_election(store, election).await?);
    }
    Ok(Json(descriptions))
}

/// Ended elections with their results.
#[get("/elections/past")]
async fn get_past_elections(
    elections: Coll<Election>,
    ledger: &State<Ledger>,
) -> Result<Json<Vec<PastElection>>> {
    let ended: Vec<Election> = elections
        .find(doc! { "state": ElectionState::Ended }, None)
        .await?
        .try_collect()
        .await?;

    let mut past = Vec::with_capacity(ended.len());
    for election in ended {
        let names = ledger.result_names(&election).await?;
        let ranked = ledger.results_of(&election).await?;
        past.push(PastElection::new(election, &names, ranked));
    }
    Ok(Json(past))
}

#[get("/elections/<election_id>")]
async fn get_election(
    election_id: ElectionId,
    store: &State<Store>,
) -> Result<Json<ElectionDescription>> {
    let election = election_by_id(&store.coll(), election_id).await?;
    Ok(Json(describe_election(store, election).await?))
}

/// Rename, retime or relink an election that has not started, replacing the
/// candidates of each linked constituency.
#[put("/elections/<election_id>", data = "<update>", format = "json")]
async fn update_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    update: Json<ElectionUpdate>,
    store: &State<Store>,
) -> Result<Json<ElectionDescription>> {
    update.validate()?;
    let elections = store.coll::<Election>();
    ensure_not_started(&election_by_id(&elections, election_id).await?)?;

    let constituency_ids = update.constituency_ids();
    let constituencies = store.coll::<Constituency>();
    constituencies_by_id(&constituencies, &constituency_ids).await?;
    for constituency in &update.constituencies {
        check_candidates(store, &constituency.candidates).await?;
    }

    let mut session = store.start_transaction().await?;
    for constituency in &update.constituencies {
        // Another election holding the constituency may start at any time.
        ensure_constituency_editable_in(&elections, constituency.id, &mut session).await?;
        let candidates: Vec<_> = constituency
            .candidates
            .iter()
            .map(|c| doc! { "party_id": c.party_id, "citizen_id": c.citizen_id })
            .collect();
        constituencies
            .update_one_with_session(
                u32_id_filter(constituency.id),
                doc! { "$set": { "candidates": candidates } },
                None,
                &mut session,
            )
            .await?;
    }
    let result = elections
        .update_one_with_session(
            doc! { "_id": election_id, "state": ElectionState::Created },
            doc! {
                "$set": {
                    "name": &update.name,
                    "time_limit": update.time_limit,
                    "constituencies": &constituency_ids,
                }
            },
            None,
            &mut session,
        )
        .await?;
    if result.matched_count != 1 {
        // Started while we were checking.
        session.abort_transaction().await?;
        return Err(Error::conflict(format!(
            "Election {election_id} can no longer be changed"
        )));
    }
    session.commit_transaction().await?;

    let election = election_by_id(&elections, election_id).await?;
    Ok(Json(describe_election(store, election).await?))
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<()> {
    ensure_not_started(&election_by_id(&elections, election_id).await?)?;

    let result = elections
        .delete_one(
            doc! { "_id": election_id, "state": ElectionState::Created },
            None,
        )
        .await?;
    if result.deleted_count != 1 {
        return Err(Error::conflict(format!(
            "Election {election_id} can no longer be deleted"
        )));
    }

    info!("Deleted election {election_id}");
    Ok(())
}

#[post("/elections/<election_id>/start")]
async fn start_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<ElectionSummary>> {
    let election = ledger.start_election(election_id).await?;
    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/end")]
async fn end_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<ElectionSummary>> {
    let election = ledger.end_election(election_id).await?;
    Ok(Json(election.into()))
}

#[get("/elections/<election_id>/results")]
async fn get_results(
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<Vec<ResultEntry>>> {
    Ok(Json(ledger.get_results(election_id).await?))
}
