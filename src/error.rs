//! Failure taxonomy and the uniform response envelope.
//!
//! Every fallible operation resolves to one of the variants below. At the
//! request boundary the variant is flattened into a `{success:false, message}`
//! JSON body with HTTP 200, which is the envelope the three frontends consume.
//! Internal errors are logged and surfaced with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Validation(String),

    #[error("Error")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        Self::Internal(Box::new(e))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(Box::new(e))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        Self::Internal(Box::new(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(e) = &self {
            error!(error = %e, "request failed");
        }

        (
            StatusCode::OK,
            Json(json!({ "success": false, "message": self.to_string() })),
        )
            .into_response()
    }
}

pub fn ok_message(message: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": message.into() })),
    )
        .into_response()
}

pub fn ok_data<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": data })),
    )
        .into_response()
}
