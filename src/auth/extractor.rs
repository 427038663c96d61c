// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthenticatedUser, AuthError, Role};
use crate::state::AppState;
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, UserRepository};

/// Extractor for authenticated users.
///
/// Verifies the bearer token and loads the user it names. A token whose
/// user no longer exists is rejected, and the role comes from the stored
/// record rather than the token.
///
/// # Example
///
/// ```rust,ignore
/// async fn list_enrollments(
///     Auth(user): Auth,
///     State(state): State<AppState>,
/// ) -> Result<Json<EnrollmentPage>, ApiError> {
///     // user.user_id contains the authenticated user's ID
/// }
/// ```
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Reuse the user if an earlier extractor already resolved it
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?
            .trim();

        let user = authenticate(state, token)?;
        parts.extensions.insert(user.clone());

        Ok(Auth(user))
    }
}

/// Verify a bearer token and resolve the current user record.
pub fn authenticate(state: &AppState, token: &str) -> Result<AuthenticatedUser, AuthError> {
    let claims = state.tokens.verify(token)?;

    let stored = match UserRepository::new(&state.db).get(&claims.sub) {
        Ok(Some(user)) => user,
        Ok(None) => return Err(AuthError::UnknownUser),
        Err(e) => {
            tracing::warn!(user_id = %claims.sub, error = %e, "User lookup failed during authentication");
            return Err(AuthError::UnknownUser);
        }
    };

    Ok(AuthenticatedUser::from_record(&claims, &stored))
}

/// Fail with `InsufficientPermissions` unless `user` holds `role`.
pub fn require_role(user: &AuthenticatedUser, role: Role) -> Result<(), AuthError> {
    if user.has_role(role) {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions)
    }
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if let Err(e) = require_role(&user, Role::Admin) {
            tracing::warn!(user_id = %user.user_id, path = %parts.uri.path(), "Admin route denied");
            AuditRepository::new(&state.files).record(
                AuditEvent::new(AuditEventType::PermissionDenied)
                    .with_user(&user.user_id)
                    .with_resource("route", parts.uri.path())
                    .failed("admin role required"),
            );
            return Err(e);
        }

        Ok(AdminOnly(user))
    }
}
