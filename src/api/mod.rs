// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderName, Request},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ErrorBody,
    models::{
        CreateUserRequest, DashboardStats, DistributeGiftForm, EnrollmentPage, EnrollmentView,
        GiftedEnrollment, GiftedEnrollmentSummary, GifterCount, GifterRef, LoginRequest,
        LoginResponse, UserListResponse, UserSummary, UserWithGifts,
    },
    service::DistributionConflict,
    state::AppState,
    storage::{AuditEvent, AuditEventType, CounterCorrection, ReconcileReport},
};

pub mod admin;
pub mod auth;
pub mod enrollments;
pub mod health;
pub mod media;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes;

    let api_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/validate", get(auth::validate))
        .route("/enrollments", get(enrollments::list))
        .route("/enrollments/search", get(enrollments::search))
        .route(
            "/enrollments/gift",
            post(enrollments::distribute).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/admin/users",
            get(admin::list_users).post(admin::create_user),
        )
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/reconcile", post(admin::reconcile))
        .route("/admin/audit/events", get(admin::query_audit_logs));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .nest("/api", api_routes)
        .route("/media/{object}", get(media::get_object))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// Registers the bearer token scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Gift Distribution API",
        description = "One-time gift distribution to enrolled individuals with proof images."
    ),
    paths(
        auth::login,
        auth::validate,
        enrollments::search,
        enrollments::list,
        enrollments::distribute,
        admin::create_user,
        admin::list_users,
        admin::dashboard,
        admin::reconcile,
        admin::query_audit_logs,
        media::get_object,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            ErrorBody,
            LoginRequest,
            LoginResponse,
            UserSummary,
            CreateUserRequest,
            UserWithGifts,
            UserListResponse,
            GiftedEnrollmentSummary,
            GifterRef,
            EnrollmentView,
            EnrollmentPage,
            GiftedEnrollment,
            DistributeGiftForm,
            DistributionConflict,
            GifterCount,
            DashboardStats,
            ReconcileReport,
            CounterCorrection,
            AuditEvent,
            AuditEventType,
            enrollments::GiftResponse,
            admin::AuditLogResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Login and token validation"),
        (name = "Enrollments", description = "Lookup, listing and gift distribution"),
        (name = "Admin", description = "Operator accounts, statistics and audit"),
        (name = "Media", description = "Locally stored proof images"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
