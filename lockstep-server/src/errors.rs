use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lockstep_collab::{CollabError, DatabaseError};
use lockstep_core::{AdmissionError, VoteError};
use log::error;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    /// The request was understood but turned down, with a reason for the user
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let Self::Unknown(message) = &self {
            error!("Request failed: {}", message);
        }

        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<CollabError> for ServerError {
    fn from(value: CollabError) -> Self {
        let message = value.to_string();

        match value {
            CollabError::Database(e) => e.into(),
            CollabError::Bus(_) => Self::Unknown(message),
            CollabError::NotLoggedIn
            | CollabError::Admission(AdmissionError::NotLoggedIn)
            | CollabError::Vote(VoteError::NotLoggedIn) => Self::Unauthorized(message),
            CollabError::InsufficientPermissions
            | CollabError::NotListening
            | CollabError::Admission(AdmissionError::Locked | AdmissionError::NotVisible) => {
                Self::Forbidden(message)
            }
            _ => Self::Rejected(message),
        }
    }
}
