use log::info;
use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            constituency::{ConstituencyDescription, ConstituencySpec},
        },
        common::{ConstituencyId, ElectionState},
        db::{admin::Admin, constituency::Constituency, election::Election},
        mongodb::{u32_id_filter, Coll, Counter, Store, CONSTITUENCY_ID_COUNTER},
    },
};

use super::common::{check_candidates, ensure_constituency_editable};

pub fn routes() -> Vec<Route> {
    routes![
        create_constituency,
        get_constituencies,
        get_constituency,
        update_constituency,
        delete_constituency,
    ]
}

async fn constituency_by_id(
    constituencies: &Coll<Constituency>,
    constituency_id: ConstituencyId,
) -> Result<Constituency> {
    constituencies
        .find_one(u32_id_filter(constituency_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Constituency {constituency_id}")))
}

#[post("/constituencies", data = "<spec>", format = "json")]
async fn create_constituency(
    _token: AuthToken<Admin>,
    spec: Json<ConstituencySpec>,
    store: &State<Store>,
) -> Result<(Status, Json<ConstituencyDescription>)> {
    spec.validate()?;
    check_candidates(store, &spec.candidates).await?;

    let id = Counter::next(&store.coll(), CONSTITUENCY_ID_COUNTER).await?;
    let constituency = spec.0.into_constituency(id);
    store
        .coll::<Constituency>()
        .insert_one(&constituency, None)
        .await?;
    info!("Created constituency {id}");

    Ok((Status::Created, Json(constituency.into())))
}

#[get("/constituencies")]
async fn get_constituencies(
    _token: AuthToken<Admin>,
    constituencies: Coll<Constituency>,
) -> Result<Json<Vec<ConstituencyDescription>>> {
    let constituencies: Vec<ConstituencyDescription> = constituencies
        .find(None, None)
        .await?
        .map_ok(ConstituencyDescription::from)
        .try_collect()
        .await?;
    Ok(Json(constituencies))
}

#[get("/constituencies/<constituency_id>")]
async fn get_constituency(
    constituency_id: ConstituencyId,
    constituencies: Coll<Constituency>,
) -> Result<Json<ConstituencyDescription>> {
    let constituency = constituency_by_id(&constituencies, constituency_id).await?;
    Ok(Json(constituency.into()))
}

/// Replace a constituency's details and candidates.
///
/// Constituencies in an election that has started are frozen.
#[put("/constituencies/<constituency_id>", data = "<spec>", format = "json")]
async fn update_constituency(
    _token: AuthToken<Admin>,
    constituency_id: ConstituencyId,
    spec: Json<ConstituencySpec>,
    store: &State<Store>,
) -> Result<Json<ConstituencyDescription>> {
    spec.validate()?;
    let constituencies = store.coll::<Constituency>();
    constituency_by_id(&constituencies, constituency_id).await?;
    ensure_constituency_editable(&store.coll(), constituency_id).await?;
    check_candidates(store, &spec.candidates).await?;

    let constituency = spec.0.into_constituency(constituency_id);
    constituencies
        .replace_one(u32_id_filter(constituency_id), &constituency, None)
        .await?;

    Ok(Json(constituency.into()))
}

/// Delete a constituency, removing it from any election that has not started.
#[delete("/constituencies/<constituency_id>")]
async fn delete_constituency(
    _token: AuthToken<Admin>,
    constituency_id: ConstituencyId,
    store: &State<Store>,
) -> Result<()> {
    constituency_by_id(&store.coll(), constituency_id).await?;
    ensure_constituency_editable(&store.coll(), constituency_id).await?;

    let mut session = store.start_transaction().await?;
    store
        .coll::<Constituency>()
        .delete_one_with_session(u32_id_filter(constituency_id), None, &mut session)
        .await?;
    store
        .coll::<Election>()
        .update_many_with_session(
            doc! { "state": ElectionState::Created, "constituencies": constituency_id },
            doc! { "$pull": { "constituencies": constituency_id } },
            None,
            &mut session,
        )
        .await?;
    session.commit_transaction().await?;

    info!("Deleted constituency {constituency_id}");
    Ok(())
}
