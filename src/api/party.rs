use log::info;
use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            citizen::CitizenDescription,
            image::{Image, ImageKind},
            party::{MembershipRequest, PartyDescription, PartySpec, PartyUpdate},
        },
        common::{CitizenId, PartyId},
        db::{
            admin::Admin,
            citizen::Citizen,
            constituency::Constituency,
            party::{Party, PartyMember},
        },
        mongodb::{u32_id_filter, Coll, Counter, Store, PARTY_ID_COUNTER},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![
        create_party,
        get_parties,
        get_party,
        update_party,
        delete_party,
        add_party_member,
    ]
}

async fn party_by_id(parties: &Coll<Party>, party_id: PartyId) -> Result<Party> {
    parties
        .find_one(u32_id_filter(party_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Party {party_id}")))
}

async fn describe_party(store: &Store, party: Party) -> Result<PartyDescription> {
    let member_ids: Vec<CitizenId> = store
        .coll::<PartyMember>()
        .find(doc! { "party_id": party.id }, None)
        .await?
        .map_ok(|member| member.citizen_id)
        .try_collect()
        .await?;
    let members: Vec<CitizenDescription> = store
        .coll::<Citizen>()
        .find(doc! { "_id": { "$in": member_ids } }, None)
        .await?
        .map_ok(CitizenDescription::from)
        .try_collect()
        .await?;
    Ok(PartyDescription::new(party, members))
}

#[post("/parties", data = "<spec>", format = "json")]
async fn create_party(
    _token: AuthToken<Admin>,
    spec: Json<PartySpec>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<(Status, Json<PartyDescription>)> {
    spec.validate()?;
    let spec = spec.0;
    let members = spec.all_members();
    let logo = spec.logo.as_deref().map(Image::decode).transpose()?;

    let citizens = store.coll::<Citizen>();
    for citizen_id in &members {
        if citizens
            .count_documents(u32_id_filter(*citizen_id), None)
            .await?
            == 0
        {
            return Err(Error::bad_request(format!(
                "Citizen {citizen_id} does not exist"
            )));
        }
    }
    let parties = store.coll::<Party>();
    if parties
        .count_documents(doc! { "name": &spec.name }, None)
        .await?
        > 0
    {
        return Err(Error::conflict(format!("Party '{}' already exists", spec.name)));
    }

    let id = Counter::next(&store.coll(), PARTY_ID_COUNTER).await?;
    let logo_path = ImageKind::PartyLogo.path_for(id);
    let party = Party {
        id,
        name: spec.name,
        logo: logo.as_ref().map(|_| logo_path.clone()),
        president: spec.president,
    };
    let memberships: Vec<_> = members
        .iter()
        .map(|&citizen_id| PartyMember {
            party_id: party.id,
            citizen_id,
        })
        .collect();

    let conflict = "The party name is taken, or a member already belongs to another party";
    let mut session = store.start_transaction().await?;
    parties
        .insert_one_with_session(&party, None, &mut session)
        .await
        .map_err(|e| Error::on_duplicate(e, conflict))?;
    store
        .coll::<PartyMember>()
        .insert_many_with_session(memberships, None, &mut session)
        .await
        .map_err(|e| Error::on_duplicate(e, conflict))?;
    session
        .commit_transaction()
        .await
        .map_err(|e| Error::on_duplicate(e, conflict))?;
    if let Some(logo) = logo {
        logo.save(config.image_dir(), &logo_path).await?;
    }
    info!("Registered party {} with {} members", party.id, members.len());

    Ok((Status::Created, Json(describe_party(store, party).await?)))
}

#[get("/parties")]
async fn get_parties(store: &State<Store>) -> Result<Json<Vec<PartyDescription>>> {
    let parties: Vec<Party> = store.coll::<Party>().find(None, None).await?.try_collect().await?;
    let mut descriptions = Vec::with_capacity(parties.len());
    for party in parties {
        descriptions.push(describe_party(store, party).await?);
    }
    Ok(Json(descriptions))
}

#[get("/parties/<party_id>")]
async fn get_party(party_id: PartyId, store: &State<Store>) -> Result<Json<PartyDescription>> {
    let party = party_by_id(&store.coll(), party_id).await?;
    Ok(Json(describe_party(store, party).await?))
}

#[put("/parties/<party_id>", data = "<update>", format = "json")]
async fn update_party(
    _token: AuthToken<Admin>,
    party_id: PartyId,
    update: Json<PartyUpdate>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<Json<PartyDescription>> {
    update.validate()?;
    let logo = update.logo.as_deref().map(Image::decode).transpose()?;
    let parties = store.coll::<Party>();
    party_by_id(&parties, party_id).await?;

    let membership = doc! {
        "party_id": party_id,
        "citizen_id": update.president,
    };
    if store
        .coll::<PartyMember>()
        .count_documents(membership, None)
        .await?
        == 0
    {
        return Err(Error::bad_request(format!(
            "Citizen {} is not a member of party {party_id}",
            update.president
        )));
    }

    let mut changes = doc! {
        "name": &update.name,
        "president": update.president,
    };
    let logo_path = ImageKind::PartyLogo.path_for(party_id);
    if logo.is_some() {
        changes.insert("logo", logo_path.clone());
    }
    parties
        .update_one(u32_id_filter(party_id), doc! { "$set": changes }, None)
        .await
        .map_err(|e| Error::on_duplicate(e, format!("Party '{}' already exists", update.name)))?;
    // A rejected rename must leave the current logo alone.
    if let Some(logo) = logo {
        logo.save(config.image_dir(), &logo_path).await?;
    }

    let party = party_by_id(&parties, party_id).await?;
    Ok(Json(describe_party(store, party).await?))
}

/// Remove a party and its memberships, unless it fields a candidate anywhere.
#[delete("/parties/<party_id>")]
async fn delete_party(
    _token: AuthToken<Admin>,
    party_id: PartyId,
    store: &State<Store>,
) -> Result<()> {
    party_by_id(&store.coll(), party_id).await?;

    let fielding = doc! { "candidates.party_id": party_id };
    if store
        .coll::<Constituency>()
        .count_documents(fielding, None)
        .await?
        > 0
    {
        return Err(Error::conflict(format!(
            "Party {party_id} has candidates standing"
        )));
    }

    let mut session = store.start_transaction().await?;
    store
        .coll::<Party>()
        .delete_one_with_session(u32_id_filter(party_id), None, &mut session)
        .await?;
    store
        .coll::<PartyMember>()
        .delete_many_with_session(doc! { "party_id": party_id }, None, &mut session)
        .await?;
    session.commit_transaction().await?;

    info!("Removed party {party_id}");
    Ok(())
}

#[post("/parties/members", data = "<request>", format = "json")]
async fn add_party_member(
    _token: AuthToken<Admin>,
    request: Json<MembershipRequest>,
    parties: Coll<Party>,
    citizens: Coll<Citizen>,
    members: Coll<PartyMember>,
) -> Result<Status> {
    party_by_id(&parties, request.party_id).await?;
    if citizens
        .count_documents(u32_id_filter(request.citizen_id), None)
        .await?
        == 0
    {
        return Err(Error::not_found(format!("Citizen {}", request.citizen_id)));
    }

    let membership = PartyMember {
        party_id: request.party_id,
        citizen_id: request.citizen_id,
    };
    members.insert_one(membership, None).await.map_err(|e| {
        Error::on_duplicate(
            e,
            format!("Citizen {} already belongs to a party", request.citizen_id),
        )
    })?;

    Ok(Status::Created)
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{http::ContentType, local::asynchronous::Client, serde::json::serde_json};

    use crate::model::db::constituency::Candidate;

    use super::*;

    async fn seed_citizens(citizens: &Coll<Citizen>) {
        citizens
            .insert_many((1..=3).map(Citizen::example_candidate), None)
            .await
            .unwrap();
    }

    fn spec() -> PartySpec {
        PartySpec {
            name: "Green".to_string(),
            logo: Some("aGVsbG8=".to_string()),
            president: 1,
            members: vec![2],
        }
    }

    async fn create<'c>(client: &'c Client, spec: &PartySpec) -> rocket::local::asynchronous::LocalResponse<'c> {
        client
            .post(uri!(create_party))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await
    }

    #[backend_test(admin)]
    async fn create_with_members(client: Client, citizens: Coll<Citizen>, members: Coll<PartyMember>) {
        seed_citizens(&citizens).await;

        let response = create(&client, &spec()).await;
        assert_eq!(Status::Created, response.status());
        let party: PartyDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(party.name, "Green");
        assert_eq!(party.president, 1);
        assert_eq!(party.logo.as_deref(), Some("/images/party_images/1.jpg"));
        let mut member_ids: Vec<_> = party.members.iter().map(|m| m.id).collect();
        member_ids.sort();
        assert_eq!(member_ids, vec![1, 2]);
        assert_eq!(members.count_documents(None, None).await.unwrap(), 2);

        let response = client.get(uri!(get_party(party.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let fetched: PartyDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(fetched.id, party.id);
        assert_eq!(fetched.members.len(), 2);
    }

    #[backend_test(admin)]
    async fn member_of_another_party_rejected(client: Client, db: Database, citizens: Coll<Citizen>) {
        seed_citizens(&citizens).await;
        assert_eq!(Status::Created, create(&client, &spec()).await.status());

        let rival = PartySpec {
            name: "Blue".to_string(),
            logo: None,
            president: 3,
            members: vec![2],
        };
        assert_eq!(Status::Conflict, create(&client, &rival).await.status());

        // The whole registration rolled back.
        assert_eq!(
            Coll::<Party>::from_db(&db)
                .count_documents(None, None)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            Coll::<PartyMember>::from_db(&db)
                .count_documents(doc! { "citizen_id": 3 }, None)
                .await
                .unwrap(),
            0
        );
    }

    #[backend_test(admin)]
    async fn duplicate_name_or_unknown_citizen_rejected(client: Client, citizens: Coll<Citizen>) {
        seed_citizens(&citizens).await;
        assert_eq!(Status::Created, create(&client, &spec()).await.status());

        let mut same_name = spec();
        same_name.president = 3;
        same_name.members.clear();
        assert_eq!(Status::Conflict, create(&client, &same_name).await.status());

        let mut unknown = spec();
        unknown.name = "Blue".to_string();
        unknown.president = 99;
        assert_eq!(Status::BadRequest, create(&client, &unknown).await.status());
    }

    #[backend_test(admin)]
    async fn update_requires_member_president(client: Client, citizens: Coll<Citizen>, parties: Coll<Party>) {
        seed_citizens(&citizens).await;
        create(&client, &spec()).await;

        let update = |president| PartyUpdate {
            name: "Greener".to_string(),
            president,
            logo: None,
        };
        let response = client
            .put(uri!(update_party(1)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&update(3)).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let response = client
            .put(uri!(update_party(1)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&update(2)).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let party = parties.find_one(u32_id_filter(1), None).await.unwrap().unwrap();
        assert_eq!(party.name, "Greener");
        assert_eq!(party.president, 2);
        assert_eq!(party.logo.as_deref(), Some("party_images/1.jpg"));
    }

    fn logo_bytes(client: &Client, party_id: PartyId) -> Vec<u8> {
        let config = client.rocket().state::<Config>().unwrap();
        std::fs::read(config.image_dir().join(ImageKind::PartyLogo.path_for(party_id))).unwrap()
    }

    #[backend_test(admin)]
    async fn similar_names_keep_separate_logos(client: Client, citizens: Coll<Citizen>) {
        seed_citizens(&citizens).await;
        let spaced = PartySpec {
            name: "Green Party".to_string(),
            logo: Some("Zmlyc3Q=".to_string()),
            president: 1,
            members: vec![],
        };
        let underscored = PartySpec {
            name: "Green_Party".to_string(),
            logo: Some("c2Vjb25k".to_string()),
            president: 2,
            members: vec![],
        };

        let mut logos = Vec::new();
        for party_spec in [&spaced, &underscored] {
            let response = create(&client, party_spec).await;
            assert_eq!(Status::Created, response.status());
            let party: PartyDescription =
                serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
            logos.push(party.logo.unwrap());
        }
        assert_ne!(logos[0], logos[1]);
        assert_eq!(logo_bytes(&client, 1), b"first");
        assert_eq!(logo_bytes(&client, 2), b"second");
    }

    #[backend_test(admin)]
    async fn rejected_rename_keeps_logo(client: Client, citizens: Coll<Citizen>, parties: Coll<Party>) {
        seed_citizens(&citizens).await;
        create(&client, &spec()).await;
        let blue = PartySpec {
            name: "Blue".to_string(),
            logo: Some("Ymx1ZQ==".to_string()),
            president: 3,
            members: vec![],
        };
        assert_eq!(Status::Created, create(&client, &blue).await.status());

        // Renaming Blue to Green clashes, so its new logo must not land anywhere.
        let update = PartyUpdate {
            name: "Green".to_string(),
            president: 3,
            logo: Some("d29ybGQ=".to_string()),
        };
        let response = client
            .put(uri!(update_party(2)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&update).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(logo_bytes(&client, 1), b"hello");
        assert_eq!(logo_bytes(&client, 2), b"blue");
        let blue = parties.find_one(u32_id_filter(2), None).await.unwrap().unwrap();
        assert_eq!(blue.name, "Blue");
    }

    #[backend_test(admin)]
    async fn add_member(client: Client, citizens: Coll<Citizen>, members: Coll<PartyMember>) {
        seed_citizens(&citizens).await;
        create(&client, &spec()).await;

        let request = |citizen_id| MembershipRequest {
            party_id: 1,
            citizen_id,
        };
        let response = client
            .post(uri!(add_party_member))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&request(3)).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        assert_eq!(members.count_documents(None, None).await.unwrap(), 3);

        let response = client
            .post(uri!(add_party_member))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&request(3)).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());

        let response = client
            .post(uri!(add_party_member))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&request(99)).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn delete_blocked_by_candidates(
        client: Client,
        citizens: Coll<Citizen>,
        constituencies: Coll<Constituency>,
        members: Coll<PartyMember>,
    ) {
        seed_citizens(&citizens).await;
        create(&client, &spec()).await;
        constituencies
            .insert_one(
                Constituency::example(
                    1,
                    vec![Candidate {
                        party_id: 1,
                        citizen_id: 1,
                    }],
                ),
                None,
            )
            .await
            .unwrap();

        let response = client.delete(uri!(delete_party(1))).dispatch().await;
        assert_eq!(Status::Conflict, response.status());

        constituencies
            .update_one(u32_id_filter(1), doc! { "$set": { "candidates": [] } }, None)
            .await
            .unwrap();
        let response = client.delete(uri!(delete_party(1))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(members.count_documents(None, None).await.unwrap(), 0);

        let response = client.get(uri!(get_party(1))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn parties_are_public(client: Client) {
        let response = client.get(uri!(get_parties)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(response.into_string().await.unwrap(), "[]");
    }
}
