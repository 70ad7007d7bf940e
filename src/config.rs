use std::path::{Path, PathBuf};

use chrono::Duration;
use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    fs::FileServer,
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    api::{admin::AdminCredentials, auth::FaceMatcher},
    db::admin::ensure_admin_exists,
    mongodb::{ensure_counters_exist, ensure_indexes_exist, Store},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    image_dir: PathBuf,
    admin_username: String,
    // secrets
    jwt_secret: String,
    voter_token_secret: String,
    admin_password: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Directory holding uploaded citizen faces and party logos.
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key voter tokens are derived under.
    /// Changing it makes earlier votes unrecognisable to double-vote checks.
    pub fn voter_token_secret(&self) -> &[u8] {
        self.voter_token_secret.as_bytes()
    }

    /// Credentials for the admin created when the database has none.
    pub fn admin_credentials(&self) -> AdminCredentials {
        AdminCredentials {
            username: self.admin_username.clone(),
            password: self.admin_password.clone(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// It also creates the image directory and serves it under `/images`.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        if let Err(e) = rocket::tokio::fs::create_dir_all(config.image_dir()).await {
            error!(
                "Failed to create image directory {}: {e}",
                config.image_dir().display()
            );
            return Err(rocket);
        }
        let images = FileServer::from(config.image_dir());

        // Manage the state.
        Ok(rocket.mount("/images", images).manage(config))
    }
}

/// Configuration for the face matching service.
#[derive(Deserialize)]
struct FaceAuthConfig {
    face_auth_url: String,
}

/// A fairing that loads the face matching config and places a [`FaceMatcher`]
/// into managed state.
pub struct FaceAuthFairing;

#[rocket::async_trait]
impl Fairing for FaceAuthFairing {
    fn info(&self) -> Info {
        Info {
            name: "Face Matching",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<FaceAuthConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load face matching config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Matching faces with {}", config.face_auth_url);
        Ok(rocket.manage(FaceMatcher::new(config.face_auth_url)))
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    db_name: String,
    // secrets
    db_uri: String,
}

/// A fairing that connects to the database unless given a [`Store`] already,
/// performs any setup necessary, and places the [`Store`] into managed state.
/// Setup needs the [`Config`], so this must be attached after [`ConfigFairing`].
#[derive(Default)]
pub struct DatabaseFairing {
    store: Option<Store>,
}

impl DatabaseFairing {
    /// Use an existing connection instead of connecting from the config.
    pub fn with_store(store: Store) -> Self {
        Self { store: Some(store) }
    }

    async fn connect(rocket: &Rocket<Build>) -> Option<Store> {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return None;
            }
        };
        info!("Loaded database config, connecting...");
        match Store::connect(&config.db_uri, &config.db_name).await {
            Ok(store) => Some(store),
            Err(e) => {
                error!("Failed to connect to database: {e}");
                None
            }
        }
    }
}

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let store = match &self.store {
            Some(store) => store.clone(),
            None => match Self::connect(&rocket).await {
                Some(store) => store,
                None => return Err(rocket),
            },
        };
        let credentials = match rocket.state::<Config>() {
            Some(config) => config.admin_credentials(),
            None => {
                error!("Config was not available when setting up the database");
                return Err(rocket);
            }
        };

        if let Err(e) = set_up(&store, credentials).await {
            error!("Failed to set up database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        Ok(rocket.manage(store))
    }
}

/// Ensure the required indexes, ID counters and at least one admin exist.
async fn set_up(store: &Store, credentials: AdminCredentials) -> crate::error::Result<()> {
    ensure_indexes_exist(store.db()).await?;
    ensure_counters_exist(&store.coll()).await?;
    ensure_admin_exists(&store.coll(), credentials).await
}
