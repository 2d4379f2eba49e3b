//! Error types for the registration authority.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use super::account_id::AccountIdError;
use super::response::json_response;

/// Errors that terminate a registration request.
///
/// Each variant maps to an HTTP status code and to the `{name, reason}`
/// document returned to the client. None of them are retried internally;
/// clients may resend the whole request since registration is idempotent.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The request used a method other than `POST`.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// The request content type was not `application/json`.
    #[error("invalid content type")]
    InvalidContentType,

    /// The body could not be decoded as a registration request.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// The request carried an empty cluster ID.
    #[error("no cluster ID provided")]
    MissingClusterId,

    /// The authorization token is not in the accepted set.
    #[error("token not recognized")]
    NotAuthorized,

    /// The account ID could not be derived from the cluster ID.
    #[error("hashing cluster ID failed: {0}")]
    HashingFailed(#[from] AccountIdError),
}

impl RegistrationError {
    /// Returns the HTTP status code for this error.
    ///
    /// - MethodNotAllowed: 405 Method Not Allowed
    /// - InvalidContentType, InvalidBody, MissingClusterId: 400 Bad Request
    /// - NotAuthorized: 401 Unauthorized
    /// - HashingFailed: 500 Internal Server Error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidContentType | Self::InvalidBody(_) | Self::MissingClusterId => {
                StatusCode::BAD_REQUEST
            },
            Self::NotAuthorized => StatusCode::UNAUTHORIZED,
            Self::HashingFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the short error code placed in the `name` field.
    ///
    /// Internal failures carry an empty name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::InvalidContentType => "InvalidContentType",
            Self::InvalidBody(_) => "InvalidBody",
            Self::MissingClusterId => "BadRequest",
            Self::NotAuthorized => "NotAuthorized",
            Self::HashingFailed(_) => "",
        }
    }

    /// Returns the human-readable text placed in the `reason` field.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::MethodNotAllowed => "Only requests of type 'POST' are accepted.".to_string(),
            Self::InvalidContentType => {
                "Only requests with Content-Type application/json are accepted.".to_string()
            },
            Self::InvalidBody(detail) => format!("Unable to parse body as JSON: {detail}"),
            Self::MissingClusterId => "No cluster ID provided.".to_string(),
            Self::NotAuthorized => "The provided token is not recognized.".to_string(),
            // The deriver's message stays in the logs.
            Self::HashingFailed(_) => "hashing cluster ID failed".to_string(),
        }
    }

    /// Builds the wire document for this error.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            name: self.name().to_string(),
            reason: self.reason(),
        }
    }
}

/// The `{name, reason}` document sent for every rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Short error code; empty for internal errors.
    pub name: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        json_response(self.status_code(), &self.body())
    }
}
