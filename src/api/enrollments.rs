// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enrollment lookup, listing and gift distribution.

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::Auth,
    error::{ApiError, ErrorBody},
    models::{DistributeGiftForm, EnrollmentPage, EnrollmentView, GiftedEnrollment},
    service::{
        gifts::{self, DistributeGift, ProofImage},
        reporting,
    },
    state::AppState,
};

/// Query for `GET /api/enrollments/search`.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Exact enrollment number
    pub enrollment_no: Option<String>,
}

/// Query for `GET /api/enrollments`.
///
/// Values that are not positive integers fall back to the defaults.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListParams {
    /// Page number, 1-based (default 1)
    pub page: Option<String>,
    /// Page size (default 10, max 100)
    pub limit: Option<String>,
}

/// Response of a successful distribution.
#[derive(Debug, Serialize, ToSchema)]
pub struct GiftResponse {
    pub message: String,
    pub enrollment: GiftedEnrollment,
}

fn lenient_number(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse().ok())
}

/// Find one enrollment by its number.
#[utoipa::path(
    get,
    path = "/api/enrollments/search",
    tag = "Enrollments",
    params(SearchParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Enrollment found", body = EnrollmentView),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 404, description = "Enrollment not found or number missing", body = ErrorBody)
    )
)]
pub async fn search(
    Auth(_user): Auth,
    Query(params): Query<SearchParams>,
    State(state): State<AppState>,
) -> Result<Json<EnrollmentView>, ApiError> {
    let enrollment_no = params.enrollment_no.unwrap_or_default();
    Ok(Json(reporting::find_by_enrollment_number(&state, &enrollment_no)?))
}

/// List enrollments in sequence order.
#[utoipa::path(
    get,
    path = "/api/enrollments",
    tag = "Enrollments",
    params(ListParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of enrollments", body = EnrollmentPage),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn list(
    Auth(_user): Auth,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<EnrollmentPage>, ApiError> {
    let page = lenient_number(params.page.as_deref());
    let limit = lenient_number(params.limit.as_deref());
    Ok(Json(reporting::list_enrollments(&state, page, limit)?))
}

/// Record the gift for an enrollment with a proof image.
#[utoipa::path(
    post,
    path = "/api/enrollments/gift",
    tag = "Enrollments",
    request_body(content = DistributeGiftForm, content_type = "multipart/form-data"),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Gift recorded", body = GiftResponse),
        (status = 400, description = "Missing or invalid input, or already distributed", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 404, description = "Enrollment not found", body = ErrorBody),
        (status = 503, description = "Image storage unavailable", body = ErrorBody)
    )
)]
pub async fn distribute(
    Auth(user): Auth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GiftResponse>, ApiError> {
    let mut enrollment_no = None;
    let mut token_number = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "enrollmentNo" => {
                enrollment_no = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid enrollmentNo: {e}")))?,
                );
            }
            "tokenNumber" => {
                token_number = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid tokenNumber: {e}")))?,
                );
            }
            "image" | "cardImage" => {
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid image upload: {e}")))?;
                image = Some(ProofImage {
                    bytes: bytes.to_vec(),
                    media_type,
                });
            }
            _ => {}
        }
    }

    let request = DistributeGift {
        enrollment_no: enrollment_no.unwrap_or_default(),
        token_number,
        image,
    };
    let enrollment = gifts::distribute_gift(&state, request, &user).await?;

    Ok(Json(GiftResponse {
        message: "Status updated successfully".to_string(),
        enrollment,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_number_parsing() {
        assert_eq!(lenient_number(Some("3")), Some(3));
        assert_eq!(lenient_number(Some(" 20 ")), Some(20));
        assert_eq!(lenient_number(Some("abc")), None);
        assert_eq!(lenient_number(None), None);
    }
}
