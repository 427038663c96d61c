// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Serves proof images written by the local object store.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::{
    error::ApiError,
    state::AppState,
    storage::{
        object_store::{is_valid_object_name, media_type_for},
        StorageError,
    },
};

/// Fetch a stored proof image.
#[utoipa::path(
    get,
    path = "/media/{object}",
    tag = "Media",
    params(("object" = String, Path, description = "Object name returned by an upload")),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 404, description = "No such object")
    )
)]
pub async fn get_object(
    Path(object): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    if !is_valid_object_name(&object) {
        return Err(ApiError::not_found("Object not found"));
    }

    let path = state.files.paths().media_object(&object);
    let bytes = match state.files.read_raw(&path) {
        Ok(bytes) => bytes,
        Err(StorageError::NotFound(_)) => return Err(ApiError::not_found("Object not found")),
        Err(e) => {
            tracing::error!(object = %object, error = %e, "Failed to read media object");
            return Err(ApiError::internal());
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, media_type_for(&object)),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    )
        .into_response())
}
