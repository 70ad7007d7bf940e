use std::collections::HashSet;

use log::info;
use mongodb::bson::{doc, Document};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            citizen::{CitizenDescription, CitizenSpec, CitizenUpdate},
            image::{Image, ImageKind},
        },
        db::{
            admin::Admin,
            citizen::Citizen,
            constituency::Constituency,
            party::{Party, PartyMember},
        },
        mongodb::{u32_id_filter, Coll, Counter, Store, CITIZEN_ID_COUNTER},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![
        create_citizen,
        get_citizens,
        get_unassigned_citizens,
        get_citizen,
        update_citizen,
        delete_citizen,
    ]
}

fn with_nid(nid: &str) -> Document {
    doc! { "nid": nid }
}

#[post("/citizens", data = "<spec>", format = "json")]
async fn create_citizen(
    _token: AuthToken<Admin>,
    spec: Json<CitizenSpec>,
    citizens: Coll<Citizen>,
    counters: Coll<Counter>,
    config: &State<Config>,
) -> Result<(Status, Json<CitizenDescription>)> {
    spec.validate()?;
    let spec = spec.0;
    let face = Image::decode(&spec.face)?;

    let id = Counter::next(&counters, CITIZEN_ID_COUNTER).await?;
    let face_path = ImageKind::CitizenFace.path_for(id);
    let citizen = Citizen {
        id,
        name: spec.name,
        nid: spec.nid,
        district: spec.district,
        face: Some(face_path.clone()),
    };
    citizens.insert_one(&citizen, None).await.map_err(|e| {
        Error::on_duplicate(e, format!("A citizen with NID {} is already registered", citizen.nid))
    })?;
    // Only written once the record owning the path exists.
    face.save(config.image_dir(), &face_path).await?;
    info!("Registered citizen {}", citizen.id);

    Ok((Status::Created, Json(citizen.into())))
}

#[get("/citizens")]
async fn get_citizens(
    _token: AuthToken<Admin>,
    citizens: Coll<Citizen>,
) -> Result<Json<Vec<CitizenDescription>>> {
    let citizens: Vec<CitizenDescription> = citizens
        .find(None, None)
        .await?
        .map_ok(CitizenDescription::from)
        .try_collect()
        .await?;
    Ok(Json(citizens))
}

/// Citizens who belong to no party.
#[get("/citizens/unassigned")]
async fn get_unassigned_citizens(
    _token: AuthToken<Admin>,
    citizens: Coll<Citizen>,
    members: Coll<PartyMember>,
) -> Result<Json<Vec<CitizenDescription>>> {
    let assigned: HashSet<_> = members
        .find(None, None)
        .await?
        .map_ok(|member| member.citizen_id)
        .try_collect()
        .await?;
    let filter = doc! { "_id": { "$nin": assigned.into_iter().collect::<Vec<_>>() } };
    let citizens: Vec<CitizenDescription> = citizens
        .find(filter, None)
        .await?
        .map_ok(CitizenDescription::from)
        .try_collect()
        .await?;
    Ok(Json(citizens))
}

#[get("/citizens/<nid>")]
async fn get_citizen(
    _token: AuthToken<Admin>,
    nid: &str,
    citizens: Coll<Citizen>,
) -> Result<Json<CitizenDescription>> {
    let citizen = citizens
        .find_one(with_nid(nid), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Citizen with NID {nid}")))?;
    Ok(Json(citizen.into()))
}

#[put("/citizens/<nid>", data = "<update>", format = "json")]
async fn update_citizen(
    _token: AuthToken<Admin>,
    nid: &str,
    update: Json<CitizenUpdate>,
    citizens: Coll<Citizen>,
    config: &State<Config>,
) -> Result<Json<CitizenDescription>> {
    update.validate()?;
    let face = update.face.as_deref().map(Image::decode).transpose()?;
    let citizen = citizens
        .find_one(with_nid(nid), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Citizen with NID {nid}")))?;

    let face_path = ImageKind::CitizenFace.path_for(citizen.id);
    let mut changes = doc! {
        "name": &update.name,
        "district": &update.district,
    };
    if face.is_some() {
        changes.insert("face", face_path.clone());
    }
    citizens
        .update_one(u32_id_filter(citizen.id), doc! { "$set": changes }, None)
        .await?;
    if let Some(face) = face {
        face.save(config.image_dir(), &face_path).await?;
    }

    let citizen = citizens
        .find_one(with_nid(nid), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Citizen with NID {nid}")))?;
    Ok(Json(citizen.into()))
}

/// Remove a citizen and their party membership.
///
/// Party presidents and candidates cannot be removed.
#[delete("/citizens/<nid>")]
async fn delete_citizen(
    _token: AuthToken<Admin>,
    nid: &str,
    store: &State<Store>,
) -> Result<()> {
    let citizens = store.coll::<Citizen>();
    let citizen = citizens
        .find_one(with_nid(nid), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Citizen with NID {nid}")))?;

    let presiding = doc! { "president": citizen.id };
    if store.coll::<Party>().count_documents(presiding, None).await? > 0 {
        return Err(Error::conflict(format!(
            "Citizen {} is a party president",
            citizen.id
        )));
    }
    let standing = doc! { "candidates.citizen_id": citizen.id };
    if store
        .coll::<Constituency>()
        .count_documents(standing, None)
        .await?
        > 0
    {
        return Err(Error::conflict(format!(
            "Citizen {} is standing as a candidate",
            citizen.id
        )));
    }

    let mut session = store.start_transaction().await?;
    citizens
        .delete_one_with_session(with_nid(nid), None, &mut session)
        .await?;
    store
        .coll::<PartyMember>()
        .delete_many_with_session(doc! { "citizen_id": citizen.id }, None, &mut session)
        .await?;
    session.commit_transaction().await?;

    info!("Removed citizen {}", citizen.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use super::*;

    async fn create(client: &Client, spec: &CitizenSpec) -> CitizenDescription {
        let response = client
            .post(uri!(create_citizen))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    #[backend_test(admin)]
    async fn create_and_get(client: Client, citizens: Coll<Citizen>) {
        let created = create(&client, &CitizenSpec::example()).await;
        assert_eq!(created.nid, CitizenSpec::example().nid);
        assert_eq!(
            created.face.as_deref(),
            Some("/images/citizen_images/1.jpg")
        );

        let stored = citizens
            .find_one(u32_id_filter(created.id), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(CitizenDescription::from(stored), created);

        let response = client
            .get(uri!(get_citizen(&created.nid)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let fetched: CitizenDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(fetched, created);
    }

    fn image_dir(client: &Client) -> std::path::PathBuf {
        client.rocket().state::<Config>().unwrap().image_dir().to_owned()
    }

    #[backend_test(admin)]
    async fn duplicate_nid_conflicts(client: Client, citizens: Coll<Citizen>) {
        create(&client, &CitizenSpec::example()).await;

        let mut again = CitizenSpec::example();
        again.face = "d29ybGQ=".to_string();
        let response = client
            .post(uri!(create_citizen))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&again).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(citizens.count_documents(None, None).await.unwrap(), 1);

        // The registered citizen keeps their face, and the rejected one left none behind.
        let faces = image_dir(&client).join("citizen_images");
        assert_eq!(std::fs::read(faces.join("1.jpg")).unwrap(), b"hello");
        assert_eq!(std::fs::read_dir(&faces).unwrap().count(), 1);
    }

    #[backend_test(admin)]
    async fn invalid_citizen_rejected(client: Client, citizens: Coll<Citizen>) {
        let mut spec = CitizenSpec::example();
        spec.name = String::new();
        let response = client
            .post(uri!(create_citizen))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let mut spec = CitizenSpec::example();
        spec.face = "%%%".to_string();
        let response = client
            .post(uri!(create_citizen))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        assert_eq!(citizens.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(admin)]
    async fn update_details(client: Client) {
        let created = create(&client, &CitizenSpec::example()).await;
        let update = CitizenUpdate {
            name: "Sam Renamed".to_string(),
            district: "Eastgate".to_string(),
            face: None,
        };

        let response = client
            .put(uri!(update_citizen(&created.nid)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&update).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let updated: CitizenDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(updated.name, update.name);
        assert_eq!(updated.district, update.district);
        assert_eq!(updated.face, created.face);

        let response = client
            .put(uri!(update_citizen("0000000000000")))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&update).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn update_replaces_face(client: Client) {
        let first = create(&client, &CitizenSpec::example()).await;
        let mut spec = CitizenSpec::example();
        spec.nid = "2000111122224".to_string();
        spec.face = "Zmlyc3Q=".to_string();
        let second = create(&client, &spec).await;

        let update = CitizenUpdate {
            name: first.name.clone(),
            district: first.district.clone(),
            face: Some("d29ybGQ=".to_string()),
        };
        let response = client
            .put(uri!(update_citizen(&first.nid)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&update).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let updated: CitizenDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(updated.face, first.face);

        let faces = image_dir(&client).join("citizen_images");
        assert_eq!(std::fs::read(faces.join(format!("{}.jpg", first.id))).unwrap(), b"world");
        assert_eq!(std::fs::read(faces.join(format!("{}.jpg", second.id))).unwrap(), b"first");
    }

    #[backend_test(admin)]
    async fn unassigned_excludes_members(client: Client, members: Coll<PartyMember>) {
        let member = create(&client, &CitizenSpec::example()).await;
        let mut spec = CitizenSpec::example();
        spec.nid = "2000111122224".to_string();
        let loner = create(&client, &spec).await;
        members
            .insert_one(
                PartyMember {
                    party_id: 1,
                    citizen_id: member.id,
                },
                None,
            )
            .await
            .unwrap();

        let response = client.get(uri!(get_unassigned_citizens)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let unassigned: Vec<CitizenDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(unassigned, vec![loner]);
    }

    #[backend_test(admin)]
    async fn delete_removes_membership(client: Client, db: Database, members: Coll<PartyMember>) {
        let created = create(&client, &CitizenSpec::example()).await;
        members
            .insert_one(
                PartyMember {
                    party_id: 1,
                    citizen_id: created.id,
                },
                None,
            )
            .await
            .unwrap();

        let response = client
            .delete(uri!(delete_citizen(&created.nid)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        assert_eq!(
            Coll::<Citizen>::from_db(&db)
                .count_documents(None, None)
                .await
                .unwrap(),
            0
        );
        assert_eq!(members.count_documents(None, None).await.unwrap(), 0);

        let response = client
            .delete(uri!(delete_citizen(&created.nid)))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn admin_only(client: Client) {
        let response = client.get(uri!(get_citizens)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}
