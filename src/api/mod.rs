use rocket::Route;

pub mod auth;
mod citizen;
mod common;
mod constituency;
mod election;
mod party;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(citizen::routes());
    routes.extend(party::routes());
    routes.extend(constituency::routes());
    routes.extend(election::routes());
    routes.extend(voting::routes());
    routes
}
