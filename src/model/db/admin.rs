use std::ops::{Deref, DerefMut};

use log::{debug, warn};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{api::admin::AdminCredentials, mongodb::Coll};

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    ///
    /// A malformed stored hash never matches.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Ensure at least one admin exists, creating one from the given credentials if not.
pub async fn ensure_admin_exists(
    admins: &Coll<NewAdmin>,
    credentials: AdminCredentials,
) -> Result<()> {
    if admins.count_documents(None, None).await? > 0 {
        debug!("Found existing admin accounts");
        return Ok(());
    }
    let username = credentials.username.clone();
    let admin = NewAdmin::try_from(credentials)?;
    admins.insert_one(admin, None).await?;
    warn!("No admins found, created default admin '{username}'");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;

    #[test]
    fn password_verification() {
        let credentials = AdminCredentials::example();
        let admin = NewAdmin::try_from(credentials.clone()).unwrap();
        assert!(admin.verify_password(&credentials.password));
        assert!(!admin.verify_password("not the password"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let admin = AdminCore {
            username: "broken".to_string(),
            password_hash: "not a hash".to_string(),
        };
        assert!(!admin.verify_password("anything"));
    }

    #[backend_test]
    async fn bootstrap_admin_created_once(db: Database, admins: Coll<Admin>) {
        // Launch already created the configured admin.
        assert_eq!(admins.count_documents(None, None).await.unwrap(), 1);

        ensure_admin_exists(&Coll::from_db(&db), AdminCredentials::example())
            .await
            .unwrap();
        assert_eq!(admins.count_documents(None, None).await.unwrap(), 1);
    }
}
