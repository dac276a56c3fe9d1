//! HTTP-facing errors
//!
//! Every variant carries the request id so the error body can be matched
//! against the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::model::{ErrorResponse, ResponseMeta};
use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed body or headers.
    #[error("invalid input data")]
    Validation { request_id: String, details: Value },

    #[error("{message}")]
    NotFound { request_id: String, message: String },

    /// The short key is already in use. `custom` selects 400 over 500.
    #[error("duplicate short key error")]
    DuplicateKey { request_id: String, custom: bool },

    /// Anything else; the cause is logged, not returned.
    #[error("internal server error")]
    Internal { request_id: String },
}

impl AppError {
    pub fn validation(request_id: &str, details: impl Into<Value>) -> Self {
        Self::Validation {
            request_id: request_id.to_string(),
            details: details.into(),
        }
    }

    /// Translates a service failure into its HTTP form.
    pub fn from_service(err: ServiceError, request_id: &str) -> Self {
        let request_id = request_id.to_string();
        match err {
            ServiceError::NotFound => Self::NotFound {
                request_id,
                message: "invalid short key".to_string(),
            },
            ServiceError::DuplicateKey { custom, .. } => Self::DuplicateKey { request_id, custom },
            ServiceError::Store(e) => {
                error!(request_id = %request_id, error = %e, "unhandled store error");
                Self::Internal { request_id }
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::DuplicateKey { custom: true, .. } => StatusCode::BAD_REQUEST,
            AppError::DuplicateKey { custom: false, .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn request_id(&self) -> &str {
        match self {
            AppError::Validation { request_id, .. }
            | AppError::NotFound { request_id, .. }
            | AppError::DuplicateKey { request_id, .. }
            | AppError::Internal { request_id } => request_id,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!(request_id = %self.request_id(), status = status.as_u16(), %message);
        } else {
            info!(request_id = %self.request_id(), status = status.as_u16(), %message);
        }

        let data = match &self {
            AppError::Validation { details, .. } => Some(details.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            meta: ResponseMeta::new(false, self.request_id(), message.clone()),
            data,
            detail: message,
        };

        (status, Json(body)).into_response()
    }
}
