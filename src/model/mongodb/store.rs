use mongodb::{error::Error as DbError, Client, ClientSession, Database};

use super::{Coll, MongoCollection};

/// Handle on the database, shared by everything that reads or writes records.
///
/// Cloning is cheap: the driver's handles are reference counted.
#[derive(Clone)]
pub struct Store {
    client: Client,
    db: Database,
}

impl Store {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    /// Connect to the given database.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, DbError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        Ok(Self::new(client, db))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get a handle on the collection of the given type.
    pub fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    /// Start a session with a transaction already open.
    ///
    /// Dropping the session without committing aborts the transaction.
    pub async fn start_transaction(&self) -> Result<ClientSession, DbError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }
}
