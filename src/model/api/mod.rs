//! Request and response bodies, as seen by API clients.

pub mod admin;
pub mod auth;
pub mod citizen;
pub mod constituency;
pub mod election;
pub mod image;
pub mod party;
pub mod results;
pub mod vote;
