// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures of the REST API. All types derive
//! `ToSchema` for OpenAPI documentation and use camelCase field names on
//! the wire.
//!
//! ## Model Categories
//!
//! - **Auth**: login and token validation
//! - **Users**: operator accounts and their distributions
//! - **Enrollments**: lookup, listing and the gift result
//! - **Dashboard**: aggregate distribution statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::storage::{StoredEnrollment, StoredUser};

// =============================================================================
// Auth Models
// =============================================================================

/// Credentials for `POST /api/auth/login`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Public view of a user account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub role: Role,
    /// Cached number of distributions recorded by this user.
    pub gifted_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_number: Option<i64>,
}

impl From<&StoredUser> for UserSummary {
    fn from(user: &StoredUser) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            gifted_count: user.gifted_count,
            token_number: user.token_number,
        }
    }
}

/// Successful login.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Bearer token for the `Authorization` header.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserSummary,
}

// =============================================================================
// User Models
// =============================================================================

/// Request body for `POST /api/admin/users`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    /// At least 8 characters.
    pub password: String,
    /// Defaults to `user`.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub token_number: Option<i64>,
}

/// One distribution recorded by a user.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GiftedEnrollmentSummary {
    pub enrollment_no: String,
    pub name: String,
    pub card_image: String,
    pub gifted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_number: Option<String>,
}

/// Operator with the enrollments they gifted.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserWithGifts {
    #[serde(flatten)]
    pub user: UserSummary,
    pub gifted_enrollments: Vec<GiftedEnrollmentSummary>,
}

/// Response for `GET /api/admin/users`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserWithGifts>,
    pub total: usize,
}

// =============================================================================
// Enrollment Models
// =============================================================================

/// Who recorded a distribution.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GifterRef {
    pub user_id: String,
    /// `None` when the user record no longer resolves.
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_number: Option<i64>,
}

/// Full enrollment as returned by lookup and listing.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentView {
    pub enrollment_no: String,
    pub sl_no: u64,
    pub pm_no: String,
    pub name: String,
    pub address: String,
    pub phone_no_1: Option<String>,
    pub phone_no_2: Option<String>,
    pub phone_no_3: Option<String>,
    pub phone_no_4: Option<String>,
    pub is_gifted: bool,
    pub gifted_by: Option<GifterRef>,
    pub gifted_at: Option<DateTime<Utc>>,
    pub card_image: Option<String>,
    pub token_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnrollmentView {
    /// Build the view; `gifter` is the resolved user for a gifted record.
    pub fn new(enrollment: &StoredEnrollment, gifter: Option<&StoredUser>) -> Self {
        let gift = enrollment.gift.as_ref();
        Self {
            enrollment_no: enrollment.enrollment_no.clone(),
            sl_no: enrollment.sl_no,
            pm_no: enrollment.pm_no.clone(),
            name: enrollment.name.clone(),
            address: enrollment.address.clone(),
            phone_no_1: enrollment.phone_no_1.clone(),
            phone_no_2: enrollment.phone_no_2.clone(),
            phone_no_3: enrollment.phone_no_3.clone(),
            phone_no_4: enrollment.phone_no_4.clone(),
            is_gifted: gift.is_some(),
            gifted_by: gift.map(|g| GifterRef {
                user_id: g.gifted_by.clone(),
                username: gifter.map(|u| u.username.clone()),
                token_number: gifter.and_then(|u| u.token_number),
            }),
            gifted_at: gift.map(|g| g.gifted_at),
            card_image: gift.map(|g| g.card_image.clone()),
            token_number: gift.and_then(|g| g.token_number.clone()),
            created_at: enrollment.created_at,
            updated_at: enrollment.updated_at,
        }
    }
}

/// Result of a successful distribution.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GiftedEnrollment {
    pub enrollment_no: String,
    pub name: String,
    pub is_gifted: bool,
    pub token_number: Option<String>,
    pub gifted_at: DateTime<Utc>,
    pub card_image: String,
}

/// One page of enrollments.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentPage {
    pub enrollments: Vec<EnrollmentView>,
    pub total_enrollments: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub page_size: u64,
}

/// Multipart body of `POST /api/enrollments/gift` (documentation only).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct DistributeGiftForm {
    pub enrollment_no: String,
    pub token_number: Option<String>,
    /// Proof image (`image/*`); `cardImage` is accepted as an alias.
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

// =============================================================================
// Dashboard Models
// =============================================================================

/// Distributions per gifter, computed from enrollments.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GifterCount {
    pub user_id: String,
    pub username: String,
    pub count: u64,
}

/// Response for `GET /api/admin/dashboard`.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Number of accounts with role `user`.
    pub total_users: u64,
    pub total_enrollments: u64,
    pub total_gifted: u64,
    pub remaining_to_gift: u64,
    pub gift_distribution: Vec<GifterCount>,
}
