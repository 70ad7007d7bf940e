use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            admin::AdminCredentials,
            auth::{AuthToken, CitizenLogin, FaceMatcher, AUTH_TOKEN_COOKIE},
            citizen::CitizenDescription,
        },
        db::{admin::Admin, citizen::Citizen},
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![authenticate_admin, authenticate_citizen, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate_admin(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<()> {
    let with_username = doc! {
        "username": &credentials.username
    };

    let admin = admins
        .find_one(with_username, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No admin found with the provided username and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config)?);

    Ok(())
}

#[post("/auth/citizen", data = "<login>", format = "json")]
pub async fn authenticate_citizen(
    cookies: &CookieJar<'_>,
    login: Json<CitizenLogin>,
    citizens: Coll<Citizen>,
    matcher: &State<FaceMatcher>,
    config: &State<Config>,
) -> Result<Json<CitizenDescription>> {
    let citizen = citizens
        .find_one(doc! { "nid": &login.nid }, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Citizen with NID {}", login.nid)))?;

    let face = citizen.face.as_deref().ok_or_else(|| {
        Error::Status(
            Status::Unauthorized,
            format!("No face on record for citizen with NID {}", login.nid),
        )
    })?;
    if !matcher
        .matches(&config.image_dir().join(face), &login.image)
        .await?
    {
        return Err(Error::Status(
            Status::Unauthorized,
            "Face does not match the citizen on record".to_string(),
        ));
    }

    let token = AuthToken::new(&citizen);
    cookies.add(token.into_cookie(config)?);

    Ok(Json(citizen.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::{serde_json, serde_json::json},
    };

    use crate::model::db::admin::NewAdmin;

    use super::*;

    #[backend_test]
    async fn admin_authenticate_valid(client: Client, admins: Coll<NewAdmin>) {
        // Ensure there is an admin to login as
        let admin = NewAdmin::try_from(AdminCredentials::example()).unwrap();
        admins.insert_one(admin, None).await.unwrap();

        let response = client
            .post(uri!(authenticate_admin))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn admin_authenticate_invalid(client: Client) {
        // Unknown username.
        let response = client
            .post(uri!(authenticate_admin))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::empty()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        // Wrong password for the bootstrap admin.
        let config = client.rocket().state::<Config>().unwrap();
        let response = client
            .post(uri!(authenticate_admin))
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": config.admin_credentials().username,
                    "password": "not the password",
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn citizen_authenticate(client: Client, citizens: Coll<Citizen>) {
        citizens.insert_one(Citizen::example(), None).await.unwrap();

        let response = client
            .post(uri!(authenticate_citizen))
            .header(ContentType::JSON)
            .body(json!(CitizenLogin::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let described: CitizenDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(described, Citizen::example().into());
    }

    #[backend_test]
    async fn citizen_wrong_face(client: Client, citizens: Coll<Citizen>) {
        citizens.insert_one(Citizen::example(), None).await.unwrap();

        let response = client
            .post(uri!(authenticate_citizen))
            .header(ContentType::JSON)
            .body(json!(CitizenLogin::example_wrong_face()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn citizen_unknown(client: Client) {
        let response = client
            .post(uri!(authenticate_citizen))
            .header(ContentType::JSON)
            .body(json!(CitizenLogin::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn logout_admin(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test(citizen)]
    async fn logout_citizen(client: Client) {
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn logout_not_logged_in(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
    }
}
