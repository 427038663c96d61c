// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::service::ServiceError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

/// Error response body.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
    /// Stable machine-readable code
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        )
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        match err {
            ServiceError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, code, msg),
            ServiceError::Conflict(msg) | ServiceError::InvalidInput(msg) => {
                Self::new(StatusCode::BAD_REQUEST, code, msg)
            }
            ServiceError::AlreadyDistributed(conflict) => {
                let details = serde_json::to_value(conflict.as_ref()).unwrap_or(Value::Null);
                Self::new(StatusCode::BAD_REQUEST, code, "Gift already distributed")
                    .with_details(details)
            }
            ServiceError::Unauthorized => {
                Self::new(StatusCode::UNAUTHORIZED, code, "Invalid credentials")
            }
            ServiceError::Forbidden => Self::new(
                StatusCode::FORBIDDEN,
                code,
                "Insufficient permissions for this operation",
            ),
            ServiceError::StorageUnavailable(msg) => {
                tracing::error!(error = %msg, "Object store unavailable");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    code,
                    "Image storage is temporarily unavailable",
                )
            }
            ServiceError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code.to_string(),
            details: self.details,
        });
        (self.status, body).into_response()
    }
}
