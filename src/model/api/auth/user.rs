use std::fmt::Display;

use mongodb::bson::{doc, Document};
use serde::de::DeserializeOwned;
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::{
    db::{admin::Admin, citizen::Citizen},
    mongodb::MongoCollection,
};

/// A user of our application, having defined rights.
pub trait User: MongoCollection + DeserializeOwned + Unpin + Send + Sync {
    /// The rights of this user type.
    const RIGHTS: Rights;
    /// The value identifying this user in an auth token.
    fn subject(&self) -> String;
    /// A filter matching the user with the given token subject.
    fn subject_filter(subject: &str) -> Document;
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Citizen = 0,
    Admin = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Citizen => "citizen",
                Self::Admin => "admin",
            }
        )
    }
}

impl User for Citizen {
    const RIGHTS: Rights = Rights::Citizen;

    /// Citizens are known by their national ID, which is also their raw voter ID.
    fn subject(&self) -> String {
        self.nid.clone()
    }

    fn subject_filter(subject: &str) -> Document {
        doc! { "nid": subject }
    }
}

impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;

    fn subject(&self) -> String {
        self.username.clone()
    }

    fn subject_filter(subject: &str) -> Document {
        doc! { "username": subject }
    }
}
