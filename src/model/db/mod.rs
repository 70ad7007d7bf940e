//! Records as they are stored in the database.

pub mod admin;
pub mod citizen;
pub mod constituency;
pub mod election;
pub mod party;
pub mod tally;
pub mod vote;
