use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use log::warn;
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::mongodb::Store;

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// Proof that the bearer logged in as a particular admin or citizen.
///
/// As a request guard, forwards unless the request carries a valid token
/// for a user of type `U` who still exists.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<U> {
    #[serde(rename = "sub")]
    subject: String,
    #[serde(rename = "rgt")]
    rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// The username of an admin, or the national ID of a citizen.
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl<U: User> AuthToken<U> {
    pub fn new(user: &U) -> Self {
        Self {
            subject: user.subject(),
            rights: U::RIGHTS,
            phantom: PhantomData,
        }
    }

    /// Sign this token into a session cookie that expires after the configured TTL.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>, Error> {
        let ttl = config.auth_ttl();
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + ttl,
        };
        let jwt = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(AUTH_TOKEN_COOKIE, jwt)
            .max_age(Duration::seconds(ttl.num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Verify a signed token, rejecting it if expired or issued for another kind of user.
    fn verify(jwt: &str, config: &Config) -> Option<Self> {
        let claims = jsonwebtoken::decode::<Claims<U>>(
            jwt,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .ok()?
        .claims;
        (claims.token.rights == U::RIGHTS).then_some(claims.token)
    }
}

#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U: User> FromRequest<'r> for AuthToken<U> {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let (Some(config), Some(store)) = (
            req.rocket().state::<Config>(),
            req.rocket().state::<Store>(),
        ) else {
            return Outcome::Failure((
                Status::InternalServerError,
                Error::Status(Status::InternalServerError, "Server not configured".to_string()),
            ));
        };

        let Some(token) = req
            .cookies()
            .get(AUTH_TOKEN_COOKIE)
            .and_then(|cookie| Self::verify(cookie.value(), config))
        else {
            return Outcome::Forward(());
        };

        // Accounts can be deleted while their tokens live on.
        match store
            .coll::<U>()
            .find_one(U::subject_filter(&token.subject), None)
            .await
        {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => {
                warn!("Rejected token for a user who no longer exists");
                Outcome::Forward(())
            }
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::db::citizen::Citizen;

    use super::*;

    fn config() -> Config {
        rocket::Config::figment().extract().unwrap()
    }

    #[test]
    fn cookie_round_trip() {
        let config = config();
        let cookie = AuthToken::new(&Citizen::example())
            .into_cookie(&config)
            .unwrap();
        assert_eq!(cookie.name(), AUTH_TOKEN_COOKIE);
        assert!(cookie.http_only().unwrap_or(false));

        let token = AuthToken::<Citizen>::verify(cookie.value(), &config).unwrap();
        assert_eq!(token.subject(), "1990123456789");
    }

    #[test]
    fn rights_must_match() {
        let config = config();
        let cookie = AuthToken::new(&Citizen::example())
            .into_cookie(&config)
            .unwrap();
        assert!(
            AuthToken::<crate::model::db::admin::Admin>::verify(cookie.value(), &config).is_none()
        );
    }

    #[test]
    fn tampered_token_rejected() {
        let config = config();
        let cookie = AuthToken::new(&Citizen::example())
            .into_cookie(&config)
            .unwrap();
        let tampered = format!("{}x", cookie.value());
        assert!(AuthToken::<Citizen>::verify(&tampered, &config).is_none());
    }
}
