// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;
use crate::storage::StoredUser;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Role at issue time
    pub role: Role,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

/// Authenticated user information resolved from a verified token.
///
/// This is the primary type used throughout the application to represent
/// the caller of a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    /// User ID (token `sub` claim)
    pub user_id: String,

    pub username: String,

    /// Role from the user record (authoritative over the token claim)
    pub role: Role,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Combine verified claims with the current user record.
    pub fn from_record(claims: &TokenClaims, user: &StoredUser) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            expires_at: claims.exp,
        }
    }

    /// Check if the user holds exactly the given role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role == required
    }

    /// Check if this user is an admin.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims(role: Role) -> TokenClaims {
        TokenClaims {
            sub: "user_123".to_string(),
            role,
            iat: 1700000000,
            exp: 1700086400,
        }
    }

    #[test]
    fn stored_role_wins_over_claim() {
        let mut user = StoredUser::new("alice", "hash", Role::User);
        user.id = "user_123".to_string();

        let auth = AuthenticatedUser::from_record(&sample_claims(Role::Admin), &user);
        assert_eq!(auth.user_id, "user_123");
        assert_eq!(auth.username, "alice");
        assert_eq!(auth.role, Role::User);
        assert!(!auth.is_admin());
        assert_eq!(auth.expires_at, 1700086400);
    }

    #[test]
    fn has_role_is_exact() {
        let user = StoredUser::new("root", "hash", Role::Admin);
        let auth = AuthenticatedUser::from_record(&sample_claims(Role::Admin), &user);
        assert!(auth.has_role(Role::Admin));
        assert!(!auth.has_role(Role::User));
    }

    #[test]
    fn claims_serialize_role_lowercase() {
        let json = serde_json::to_value(sample_claims(Role::Admin)).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["sub"], "user_123");
    }
}
