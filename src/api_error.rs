//! The request-boundary error type.
//!
//! Failures inside the pipeline are contained per category and per field;
//! whatever still escapes a handler is wrapped here and surfaced as a JSON
//! `{error, details?}` body, never a crash.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::prelude::*;

#[derive(Debug)]
pub enum ApiError {
    /// A required static asset is missing.
    NotFound { message: String },

    /// Anything else that escapes a handler.
    Failure {
        message: String,
        details: Option<String>,
    },
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound {
            message: message.into(),
        }
    }

    /// Wrap an unexpected error, exposing its message as `details`.
    pub fn failure(message: impl Into<String>, err: anyhow::Error) -> Self {
        ApiError::Failure {
            message: message.into(),
            details: Some(format!("{err:#}")),
        }
    }

    /// A failure that exposes no details to the client.
    pub fn opaque(message: impl Into<String>) -> Self {
        ApiError::Failure {
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound { message } => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Failure { message, details } => {
                error!(details = ?details, "Request failed: {message}");
                let mut body = json!({ "error": message });
                if let Some(details) = details {
                    body["details"] = json!(details);
                }
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
