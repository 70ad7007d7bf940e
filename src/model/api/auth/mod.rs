mod face;
mod token;
mod user;

pub use face::{CitizenLogin, FaceAuthError, FaceMatcher};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Rights, User};
