// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Business error taxonomy shared by all services.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthError;
use crate::models::GifterRef;
use crate::storage::{DbError, ObjectStoreError};

/// Who already distributed the gift, and when.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DistributionConflict {
    pub gifted_by: GifterRef,
    pub gifted_at: DateTime<Utc>,
}

/// Errors returned by service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Gift already distributed")]
    AlreadyDistributed(Box<DistributionConflict>),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Insufficient permissions for this operation")]
    Forbidden,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::AlreadyDistributed(_) => "already_distributed",
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::Unauthorized => "unauthorized",
            ServiceError::Forbidden => "forbidden",
            ServiceError::StorageUnavailable(_) => "storage_unavailable",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::AlreadyExists(what) => ServiceError::Conflict(format!("{what} already exists")),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<ObjectStoreError> for ServiceError {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::InvalidMediaType(media_type) => {
                ServiceError::InvalidInput(format!("Unsupported image type: {media_type}"))
            }
            ObjectStoreError::Unavailable(msg) | ObjectStoreError::Misconfigured(msg) => {
                ServiceError::StorageUnavailable(msg)
            }
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InsufficientPermissions => ServiceError::Forbidden,
            AuthError::InternalError(msg) => ServiceError::Internal(msg),
            _ => ServiceError::Unauthorized,
        }
    }
}
