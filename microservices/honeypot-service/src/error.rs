//! Error types for the honeypot service.
//!
//! `/honeypot` never surfaces a 5xx: internal failures degrade each
//! pipeline stage to its identity element and the handler still replies
//! 200. Only authentication and schema validation are fatal to the
//! request, per the product's "always 200" policy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing API key")]
    MissingApiKey,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("invalid request body: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Error::MissingApiKey => (
                StatusCode::UNAUTHORIZED,
                "Missing API key.".to_string(),
            ),
            Error::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "Invalid API key.".to_string(),
            ),
            Error::InvalidRequest(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Error::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
