use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::logging::RequestId;
use crate::service::QuorumService;

pub fn routes() -> Vec<Route> {
    routes![discharge]
}

/// A third-party caveat the credential authority wants discharged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeRequest {
    /// The caveat id, needed again to mint the discharge.
    pub id: String,
    /// The caveat condition, which carries the quorum policy.
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InteractionRequiredBody {
    pub code: String,
    pub message: String,
    pub info: InteractionInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionInfo {
    #[serde(rename = "VisitURL")]
    pub visit_url: String,
    #[serde(rename = "WaitURL")]
    pub wait_url: String,
}

/// Tells the client to poll for the discharge rather than receive it now.
#[derive(Debug, Responder)]
#[response(status = 401)]
pub struct InteractionRequired(Json<InteractionRequiredBody>);

impl InteractionRequired {
    pub fn new(wait_url: String) -> Self {
        Self(Json(InteractionRequiredBody {
            code: "interaction required".to_string(),
            message: "quorum approval required".to_string(),
            info: InteractionInfo {
                visit_url: wait_url.clone(),
                wait_url,
            },
        }))
    }
}

#[post("/discharge", data = "<request>", format = "json")]
async fn discharge(
    request: Json<DischargeRequest>,
    request_id: &RequestId,
    service: &State<QuorumService>,
    config: &State<Config>,
) -> Result<InteractionRequired> {
    let election = service
        .create_election(&request.id, &request.condition)
        .await?;
    debug!("req{request_id} started election {election}");
    Ok(InteractionRequired::new(config.wait_url(&election)))
}
