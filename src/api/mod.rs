use rocket::Route;

mod discharge;
mod quorum;

pub use discharge::{DischargeRequest, InteractionRequired};
pub use quorum::WaitResponse;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(quorum::routes());
    routes.extend(discharge::routes());
    routes
}
