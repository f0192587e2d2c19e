use rocket::{http::Status, Route, State};

use crate::error::{Error, Result};
use crate::model::{id::IdParseError, BallotId, ElectionId};
use crate::service::{QuorumService, WaitOutcome};

pub fn routes() -> Vec<Route> {
    routes![wait, approve, deny]
}

/// The state of an election as reported to a polling client.
#[derive(Debug, Responder)]
pub enum WaitResponse {
    #[response(status = 202)]
    Pending(()),
    #[response(status = 403)]
    Denied(()),
    /// The body is the discharge, verbatim.
    #[response(status = 201)]
    Discharged(Vec<u8>),
}

#[get("/wait/<id>")]
async fn wait(
    id: std::result::Result<ElectionId, IdParseError>,
    service: &State<QuorumService>,
) -> Result<WaitResponse> {
    let outcome = match id {
        Ok(id) => service.wait(&id).await,
        Err(_) => Err(Error::not_found("election")),
    };

    match outcome {
        Ok(WaitOutcome::Pending) => Ok(WaitResponse::Pending(())),
        Ok(WaitOutcome::Denied) => Ok(WaitResponse::Denied(())),
        Ok(WaitOutcome::Discharged(discharge)) => Ok(WaitResponse::Discharged(discharge)),
        // Closed elections land here too.
        Err(e @ Error::NotFound(_)) => Err(Error::Status(Status::BadRequest, e.to_string())),
        Err(e) => Err(e),
    }
}

#[get("/approve/<ballot>")]
async fn approve(
    ballot: std::result::Result<BallotId, IdParseError>,
    service: &State<QuorumService>,
) -> Result<Status> {
    let result = match ballot {
        Ok(ballot) => service.approve(&ballot).await,
        Err(_) => Err(Error::not_found("ballot")),
    };
    result.map_err(|e| vote_error("approve", e))?;
    Ok(Status::NoContent)
}

#[get("/deny/<ballot>")]
async fn deny(
    ballot: std::result::Result<BallotId, IdParseError>,
    service: &State<QuorumService>,
) -> Result<Status> {
    let result = match ballot {
        Ok(ballot) => service.deny(&ballot).await,
        Err(_) => Err(Error::not_found("ballot")),
    };
    result.map_err(|e| vote_error("deny", e))?;
    Ok(Status::NoContent)
}

/// A missing ballot is reported with its detail; backend failures stay generic.
fn vote_error(action: &str, e: Error) -> Error {
    match e {
        Error::NotFound(_) => Error::Status(
            Status::InternalServerError,
            format!("storage failed on '{action}': {e}"),
        ),
        e => e,
    }
}
