use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder, Request};
use thiserror::Error;

use crate::logging::redacted_path;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The policy could never be satisfied, or could not be decoded.
    #[error("Invalid policy: {0}")]
    Validation(String),
    /// Unknown election or ballot. Consumed ballots look exactly like ballots
    /// that never existed.
    #[error("Not found: {0}")]
    NotFound(String),
    /// A participant could not be validated or reached.
    #[error("Notifier error: {0}")]
    Notifier(String),
    /// The credential authority failed to mint a discharge.
    #[error("Credential authority error: {0}")]
    Authority(String),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    /// The storage backend failed.
    #[error(transparent)]
    Db(#[from] DbError),
    /// An explicit status chosen by an endpoint, with a client-facing message.
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Does this error come from our own machinery rather than the caller?
    /// Such errors are logged in full but reported only generically.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Authority(_) | Self::Jwt(_) | Self::Db(_)
        )
    }

    /// The HTTP status this error maps to unless an endpoint overrides it.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::Notifier(_)
            | Self::Authority(_)
            | Self::Jwt(_)
            | Self::Db(_) => Status::InternalServerError,
            Self::Status(status, _) => *status,
        }
    }
}

impl Error {
    /// How this error is logged when answering `req`. Ballot ids never reach
    /// the log.
    fn log_line(&self, req: &Request<'_>) -> String {
        format!("{} {}: {self}", req.method(), redacted_path(req.uri()))
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let body = if self.is_internal() {
            error!("{}", self.log_line(req));
            "internal server error".to_string()
        } else {
            debug!("{}", self.log_line(req));
            self.to_string()
        };
        (status, body).respond_to(req)
    }
}
