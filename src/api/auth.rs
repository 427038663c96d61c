// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login and token validation.

use axum::{extract::State, Json};

use crate::{
    auth::Auth,
    error::{ApiError, ErrorBody},
    models::{LoginRequest, LoginResponse, UserSummary},
    service::identity,
    state::AppState,
};

/// Exchange credentials for a bearer token.
///
/// A wrong password and an unknown username produce the same response.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let response = identity::login(&state, &request.username, &request.password).await?;
    Ok(Json(response))
}

/// Return the caller's account if the token is still valid.
#[utoipa::path(
    get,
    path = "/api/auth/validate",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token is valid", body = UserSummary),
        (status = 401, description = "Invalid or expired token", body = ErrorBody)
    )
)]
pub async fn validate(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserSummary>, ApiError> {
    Ok(Json(identity::current_user(&state, &user)?))
}
