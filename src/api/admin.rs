// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the Admin role and provide:
//! - Operator account management
//! - Distribution statistics
//! - Counter reconciliation
//! - Audit log queries

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::AdminOnly,
    error::{ApiError, ErrorBody},
    models::{CreateUserRequest, DashboardStats, UserListResponse, UserSummary},
    service::{identity, reconcile_counters, reporting},
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditRepository, ReconcileReport},
};

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AuditQueryParams {
    /// Start date (YYYY-MM-DD, default today).
    pub start_date: Option<String>,
    /// End date (YYYY-MM-DD, default today).
    pub end_date: Option<String>,
    /// Filter by acting user ID.
    pub user_id: Option<String>,
    /// Filter by event type (e.g. `gift_distributed`).
    pub event_type: Option<String>,
    /// Filter by resource type.
    pub resource_type: Option<String>,
    /// Filter by resource ID.
    pub resource_id: Option<String>,
    /// Maximum number of results (default 100, max 1000).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub events: Vec<AuditEvent>,
    /// Total count before limit/offset.
    pub total: usize,
    pub has_more: bool,
}

fn parse_date(raw: Option<&str>, field: &str) -> Result<NaiveDate, ApiError> {
    match raw {
        None => Ok(Utc::now().date_naive()),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| ApiError::bad_request(format!("Invalid {field} format. Use YYYY-MM-DD."))),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create an operator or admin account.
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "Admin",
    request_body = CreateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "User created", body = UserSummary),
        (status = 400, description = "Invalid input or username taken", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not authorized (admin required)", body = ErrorBody)
    )
)]
pub async fn create_user(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserSummary>), ApiError> {
    let user = identity::create_user(&state, request, Some(&admin)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// List operators with the enrollments each one gifted.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Operators and their distributions", body = UserListResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not authorized (admin required)", body = ErrorBody)
    )
)]
pub async fn list_users(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, ApiError> {
    let response = reporting::list_users_with_gifts(&state)?;
    audit_log!(&state.files, AuditEventType::AdminAccess, &admin, "users", "list");
    Ok(Json(response))
}

/// Aggregate distribution figures.
#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not authorized (admin required)", body = ErrorBody)
    )
)]
pub async fn dashboard(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, ApiError> {
    let stats = reporting::dashboard_stats(&state)?;
    audit_log!(&state.files, AuditEventType::AdminAccess, &admin, "dashboard", "stats");
    Ok(Json(stats))
}

/// Recompute every gifter counter from the enrollment records.
#[utoipa::path(
    post,
    path = "/api/admin/reconcile",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reconciliation report", body = ReconcileReport),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not authorized (admin required)", body = ErrorBody)
    )
)]
pub async fn reconcile(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let report = reconcile_counters(state.db.clone(), state.files.clone()).await?;
    audit_log!(&state.files, AuditEventType::AdminAccess, &admin, "counters", "reconcile");
    Ok(Json(report))
}

/// Query audit logs.
///
/// Supports date range, user ID, event type and resource filtering.
#[utoipa::path(
    get,
    path = "/api/admin/audit/events",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not authorized (admin required)", body = ErrorBody)
    )
)]
pub async fn query_audit_logs(
    AdminOnly(admin): AdminOnly,
    Query(params): Query<AuditQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let start = parse_date(params.start_date.as_deref(), "startDate")?;
    let end = parse_date(params.end_date.as_deref(), "endDate")?;
    if start > end {
        return Err(ApiError::bad_request("startDate must not be after endDate"));
    }

    let mut events = AuditRepository::new(&state.files)
        .read_events_range(start, end)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to read audit events");
            ApiError::internal()
        })?;

    if let Some(user_id) = &params.user_id {
        events.retain(|e| e.user_id.as_deref() == Some(user_id.as_str()));
    }
    if let Some(event_type) = &params.event_type {
        events.retain(|e| e.event_type.as_str() == event_type);
    }
    if let Some(resource_type) = &params.resource_type {
        events.retain(|e| e.resource_type.as_deref() == Some(resource_type.as_str()));
    }
    if let Some(resource_id) = &params.resource_id {
        events.retain(|e| e.resource_id.as_deref() == Some(resource_id.as_str()));
    }

    let total = events.len();
    let limit = params.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).min(MAX_AUDIT_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let has_more = offset.saturating_add(limit) < total;
    let events: Vec<AuditEvent> = events.into_iter().skip(offset).take(limit).collect();

    audit_log!(&state.files, AuditEventType::AdminAccess, &admin, "audit", "query");

    Ok(Json(AuditLogResponse {
        events,
        total,
        has_more,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_query_params_deserializes() {
        let params: AuditQueryParams = serde_json::from_str(
            r#"{
            "startDate": "2026-01-01",
            "endDate": "2026-01-31",
            "eventType": "gift_distributed",
            "limit": 50
        }"#,
        )
        .unwrap();

        assert_eq!(params.start_date.as_deref(), Some("2026-01-01"));
        assert_eq!(params.event_type.as_deref(), Some("gift_distributed"));
        assert_eq!(params.limit, Some(50));
    }

    #[test]
    fn parse_date_defaults_to_today() {
        assert_eq!(parse_date(None, "startDate").unwrap(), Utc::now().date_naive());
        assert!(parse_date(Some("01/02/2026"), "startDate").is_err());
    }
}
