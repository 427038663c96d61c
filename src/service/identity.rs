// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account creation and login.
//!
//! Password hashing is CPU bound and runs on the blocking pool.

use tracing::{info, warn};

use super::ServiceError;
use crate::auth::{AuthenticatedUser, Role};
use crate::models::{CreateUserRequest, LoginResponse, UserSummary};
use crate::state::AppState;
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, StoredUser, UserRepository};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_USERNAME_LEN: usize = 64;

/// Create an account. Only admins reach this through the API.
pub async fn create_user(
    state: &AppState,
    request: CreateUserRequest,
    actor: Option<&AuthenticatedUser>,
) -> Result<UserSummary, ServiceError> {
    let username = request.username.trim().to_string();
    if username.is_empty() {
        return Err(ServiceError::InvalidInput("Username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ServiceError::InvalidInput(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let users = UserRepository::new(&state.db);
    if users.get_by_username(&username)?.is_some() {
        return Err(ServiceError::Conflict("Username already exists".to_string()));
    }

    let hasher = state.passwords.clone();
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| ServiceError::Internal(format!("hashing task failed: {e}")))??;

    let mut user = StoredUser::new(username, password_hash, request.role.unwrap_or_default());
    user.token_number = request.token_number;

    // The index check inside `create` closes the race with a concurrent creation
    users.create(&user).map_err(|e| match ServiceError::from(e) {
        ServiceError::Conflict(_) => ServiceError::Conflict("Username already exists".to_string()),
        other => other,
    })?;

    info!(user_id = %user.id, username = %user.username, role = %user.role, "User created");
    let mut event = AuditEvent::new(AuditEventType::UserCreated)
        .with_resource("user", &user.id)
        .with_details(serde_json::json!({
            "username": user.username,
            "role": user.role,
        }));
    if let Some(actor) = actor {
        event = event.with_user(&actor.user_id);
    }
    AuditRepository::new(&state.files).record(event);

    Ok(UserSummary::from(&user))
}

/// Check credentials and issue a session token.
///
/// Unknown usernames and wrong passwords produce the same error after the
/// same amount of hashing work.
pub async fn login(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<LoginResponse, ServiceError> {
    let username = username.trim().to_string();
    let user = UserRepository::new(&state.db).get_by_username(&username)?;

    let hasher = state.passwords.clone();
    let password = password.to_string();
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let verified = tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => hasher.verify(&password, &hash),
        None => hasher.verify_dummy(&password),
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("verification task failed: {e}")))?;

    let user = match user {
        Some(user) if verified => user,
        _ => {
            warn!(username = %username, "Login failed");
            AuditRepository::new(&state.files).record(
                AuditEvent::new(AuditEventType::LoginFailure)
                    .with_details(serde_json::json!({ "username": username }))
                    .failed("invalid credentials"),
            );
            return Err(ServiceError::Unauthorized);
        }
    };

    let issued = state.tokens.issue(&user.id, user.role)?;

    info!(user_id = %user.id, "Login succeeded");
    AuditRepository::new(&state.files)
        .record(AuditEvent::new(AuditEventType::LoginSuccess).with_user(&user.id));

    Ok(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user: UserSummary::from(&user),
    })
}

/// Current summary of the authenticated caller.
pub fn current_user(state: &AppState, user: &AuthenticatedUser) -> Result<UserSummary, ServiceError> {
    UserRepository::new(&state.db)
        .get(&user.user_id)?
        .map(|stored| UserSummary::from(&stored))
        .ok_or(ServiceError::Unauthorized)
}

/// Create `username` as an admin unless an account with that name exists.
///
/// Returns `true` when the account was created.
pub async fn ensure_admin(state: &AppState, username: &str, password: &str) -> Result<bool, ServiceError> {
    if let Some(existing) = UserRepository::new(&state.db).get_by_username(username.trim())? {
        if existing.role != Role::Admin {
            warn!(username = %existing.username, "Bootstrap admin name is taken by a non-admin account");
        }
        return Ok(false);
    }

    let request = CreateUserRequest {
        username: username.to_string(),
        password: password.to_string(),
        role: Some(Role::Admin),
        token_number: None,
    };
    match create_user(state, request, None).await {
        Ok(_) => Ok(true),
        Err(ServiceError::Conflict(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
