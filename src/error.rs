use std::fmt::Display;

use log::{debug, error};
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::{LifecycleError, VoteError};
use crate::logging::RequestId;
use crate::model::api::auth::FaceAuthError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Argon2(#[from] argon2::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    FaceAuth(#[from] FaceAuthError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// The given thing does not exist.
    pub fn not_found(what: impl Display) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Status(Status::Conflict, reason.into())
    }

    /// Map a unique index violation to a conflict with the given reason.
    pub fn on_duplicate(err: mongodb::error::Error, reason: impl Into<String>) -> Self {
        if crate::model::mongodb::is_duplicate_key_error(&err) {
            Self::conflict(reason)
        } else {
            err.into()
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) | Self::Io(_) => {
                Status::InternalServerError
            }
            Self::FaceAuth(_) => Status::BadGateway,
            Self::Vote(e) => match e {
                VoteError::Validation(_) => Status::BadRequest,
                VoteError::AlreadyVoted { .. } => Status::Forbidden,
                VoteError::InvalidReference(_) => Status::NotFound,
                VoteError::Lifecycle(e) => lifecycle_status(e),
                VoteError::Db(_) => Status::InternalServerError,
            },
            Self::Lifecycle(e) => lifecycle_status(e),
            Self::Status(status, _) => *status,
        }
    }
}

fn lifecycle_status(err: &LifecycleError) -> Status {
    match err {
        LifecycleError::NotFound(_) => Status::NotFound,
        LifecycleError::InvalidTransition { .. } | LifecycleError::NotAcceptingVotes { .. } => {
            Status::Conflict
        }
        LifecycleError::Db(_) => Status::InternalServerError,
    }
}

/// Body of an error response.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        match status.class() {
            // Internal details stay in the logs.
            StatusClass::ServerError => {
                error!("{} failed: {self}", RequestId::of(req));
                Err(status)
            }
            _ => {
                debug!("{self}");
                let body = ErrorBody {
                    error: self.to_string(),
                };
                (status, Json(body)).respond_to(req)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::common::ElectionState;

    #[test]
    fn vote_errors_map_to_statuses() {
        let cases = [
            (VoteError::Validation("empty".into()), Status::BadRequest),
            (
                VoteError::AlreadyVoted {
                    election_id: 1,
                    constituency_id: 2,
                },
                Status::Forbidden,
            ),
            (VoteError::InvalidReference("gone".into()), Status::NotFound),
            (
                VoteError::Lifecycle(LifecycleError::NotAcceptingVotes {
                    election_id: 1,
                    state: ElectionState::Created,
                }),
                Status::Conflict,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(Error::from(err).status(), status);
        }
    }

    #[test]
    fn lifecycle_errors_map_to_statuses() {
        assert_eq!(
            Error::from(LifecycleError::NotFound(3)).status(),
            Status::NotFound
        );
        assert_eq!(
            Error::from(LifecycleError::InvalidTransition {
                election_id: 3,
                from: ElectionState::Ended,
                to: ElectionState::Started,
            })
            .status(),
            Status::Conflict
        );
    }

    #[test]
    fn not_found_message() {
        let err = Error::not_found("Election 4");
        assert_eq!(err.status(), Status::NotFound);
        assert_eq!(err.to_string(), "Election 4 not found");
    }
}
