// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only views over enrollments and users.
//!
//! Distribution figures are always computed from the enrollment records.
//! The cached `gifted_count` on users is reported as-is but never used to
//! derive totals.

use std::collections::HashMap;

use super::ServiceError;
use crate::auth::Role;
use crate::models::{
    DashboardStats, EnrollmentPage, EnrollmentView, GiftedEnrollmentSummary, GifterCount,
    UserListResponse, UserSummary, UserWithGifts,
};
use crate::state::AppState;
use crate::storage::{EnrollmentRepository, StoredUser, UserRepository};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Normalize raw paging input: absent or non-positive values fall back to
/// the defaults and the page size is capped.
pub fn normalize_paging(page: Option<i64>, page_size: Option<i64>) -> (u64, u64) {
    let page = page
        .filter(|p| *p > 0)
        .map(|p| p as u64)
        .unwrap_or(DEFAULT_PAGE);
    let page_size = page_size
        .filter(|s| *s > 0)
        .map(|s| (s as u64).min(MAX_PAGE_SIZE))
        .unwrap_or(DEFAULT_PAGE_SIZE);
    (page, page_size)
}

/// Exact lookup by enrollment number, with the gifter's name resolved.
///
/// A blank number matches nothing and is reported as not found.
pub fn find_by_enrollment_number(state: &AppState, enrollment_no: &str) -> Result<EnrollmentView, ServiceError> {
    let enrollment_no = enrollment_no.trim();
    if enrollment_no.is_empty() {
        return Err(ServiceError::NotFound("Enrollment not found".to_string()));
    }

    let enrollment = EnrollmentRepository::new(&state.db)
        .get(enrollment_no)?
        .ok_or_else(|| ServiceError::NotFound("Enrollment not found".to_string()))?;

    let gifter = match &enrollment.gift {
        Some(gift) => UserRepository::new(&state.db).get(&gift.gifted_by)?,
        None => None,
    };

    Ok(EnrollmentView::new(&enrollment, gifter.as_ref()))
}

/// One page of enrollments in sequence-number order.
pub fn list_enrollments(
    state: &AppState,
    page: Option<i64>,
    page_size: Option<i64>,
) -> Result<EnrollmentPage, ServiceError> {
    let (page, page_size) = normalize_paging(page, page_size);
    let repo = EnrollmentRepository::new(&state.db);

    let total = repo.count()?;
    let total_pages = total.div_ceil(page_size);
    let offset = (page - 1).saturating_mul(page_size);

    let records = if offset >= total {
        Vec::new()
    } else {
        repo.list_page(offset, page_size as usize)?
    };

    let users = UserRepository::new(&state.db);
    let mut gifters: HashMap<String, Option<StoredUser>> = HashMap::new();
    let mut enrollments = Vec::with_capacity(records.len());
    for record in &records {
        let gifter = match &record.gift {
            Some(gift) => {
                if !gifters.contains_key(&gift.gifted_by) {
                    let user = users.get(&gift.gifted_by)?;
                    gifters.insert(gift.gifted_by.clone(), user);
                }
                gifters.get(&gift.gifted_by).and_then(Option::as_ref)
            }
            None => None,
        };
        enrollments.push(EnrollmentView::new(record, gifter));
    }

    Ok(EnrollmentPage {
        enrollments,
        total_enrollments: total,
        total_pages,
        current_page: page,
        page_size,
    })
}

/// Aggregate figures for the admin dashboard.
///
/// The per-gifter breakdown groups gifted enrollments by `gifted_by` and
/// lists gifters whose user record exists, busiest first.
pub fn dashboard_stats(state: &AppState) -> Result<DashboardStats, ServiceError> {
    let users = UserRepository::new(&state.db).list_all()?;
    let enrollments = EnrollmentRepository::new(&state.db).list_all()?;

    let total_users = users.iter().filter(|u| u.role == Role::User).count() as u64;
    let total_enrollments = enrollments.len() as u64;

    let mut per_gifter: HashMap<&str, u64> = HashMap::new();
    let mut total_gifted = 0u64;
    for gift in enrollments.iter().filter_map(|e| e.gift.as_ref()) {
        total_gifted += 1;
        *per_gifter.entry(gift.gifted_by.as_str()).or_default() += 1;
    }

    let mut gift_distribution: Vec<GifterCount> = users
        .iter()
        .filter_map(|user| {
            per_gifter.get(user.id.as_str()).map(|count| GifterCount {
                user_id: user.id.clone(),
                username: user.username.clone(),
                count: *count,
            })
        })
        .collect();
    gift_distribution.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.username.cmp(&b.username)));

    Ok(DashboardStats {
        total_users,
        total_enrollments,
        total_gifted,
        remaining_to_gift: total_enrollments - total_gifted,
        gift_distribution,
    })
}

/// Operators with the enrollments each of them gifted.
pub fn list_users_with_gifts(state: &AppState) -> Result<UserListResponse, ServiceError> {
    let operators = UserRepository::new(&state.db).list_by_role(Role::User)?;
    let gifted = EnrollmentRepository::new(&state.db).list_gifted()?;

    let mut by_gifter: HashMap<&str, Vec<GiftedEnrollmentSummary>> = HashMap::new();
    for enrollment in &gifted {
        if let Some(gift) = &enrollment.gift {
            by_gifter
                .entry(gift.gifted_by.as_str())
                .or_default()
                .push(GiftedEnrollmentSummary {
                    enrollment_no: enrollment.enrollment_no.clone(),
                    name: enrollment.name.clone(),
                    card_image: gift.card_image.clone(),
                    gifted_at: gift.gifted_at,
                    token_number: gift.token_number.clone(),
                });
        }
    }

    let users: Vec<UserWithGifts> = operators
        .iter()
        .map(|user| {
            let mut gifted_enrollments = by_gifter.remove(user.id.as_str()).unwrap_or_default();
            gifted_enrollments.sort_by(|a, b| a.gifted_at.cmp(&b.gifted_at));
            UserWithGifts {
                user: UserSummary::from(user),
                gifted_enrollments,
            }
        })
        .collect();

    Ok(UserListResponse {
        total: users.len(),
        users,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{GiftCounterRepository, GiftRecord};
    use crate::test_support::TestContext;

    fn gift(ctx: &TestContext, enrollment_no: &str, user_id: &str, apply_counter: bool) {
        EnrollmentRepository::new(&ctx.state.db)
            .mark_gifted(enrollment_no, GiftRecord::new(user_id, "https://cdn/p.png", None))
            .unwrap();
        if apply_counter {
            GiftCounterRepository::new(&ctx.state.db).apply(enrollment_no).unwrap();
        }
    }

    #[test]
    fn paging_defaults_and_caps() {
        assert_eq!(normalize_paging(None, None), (1, 10));
        assert_eq!(normalize_paging(Some(0), Some(-5)), (1, 10));
        assert_eq!(normalize_paging(Some(3), Some(500)), (3, 100));
        assert_eq!(normalize_paging(Some(2), Some(25)), (2, 25));
    }

    #[test]
    fn third_page_of_twenty_five() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(25);

        let page = list_enrollments(&ctx.state, Some(3), Some(10)).unwrap();
        assert_eq!(page.enrollments.len(), 5);
        assert_eq!(page.total_enrollments, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 3);
        let sl: Vec<u64> = page.enrollments.iter().map(|e| e.sl_no).collect();
        assert_eq!(sl, vec![21, 22, 23, 24, 25]);
    }

    #[test]
    fn out_of_range_page_is_empty() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(25);

        let page = list_enrollments(&ctx.state, Some(99), Some(10)).unwrap();
        assert!(page.enrollments.is_empty());
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 99);
    }

    #[test]
    fn empty_store_has_zero_pages() {
        let ctx = TestContext::new();
        let page = list_enrollments(&ctx.state, None, None).unwrap();
        assert!(page.enrollments.is_empty());
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn listing_resolves_gifter_names() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(2);
        let alice = ctx.create_user("alice", Role::User);
        gift(&ctx, "E2", &alice.id, true);

        let page = list_enrollments(&ctx.state, None, None).unwrap();
        assert!(page.enrollments[0].gifted_by.is_none());
        let gifted_by = page.enrollments[1].gifted_by.as_ref().unwrap();
        assert_eq!(gifted_by.username.as_deref(), Some("alice"));
    }

    #[test]
    fn find_by_number() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(3);
        let bob = ctx.create_user("bob", Role::User);
        gift(&ctx, "E3", &bob.id, true);

        let view = find_by_enrollment_number(&ctx.state, " E3 ").unwrap();
        assert!(view.is_gifted);
        assert_eq!(view.gifted_by.unwrap().username.as_deref(), Some("bob"));

        assert!(matches!(
            find_by_enrollment_number(&ctx.state, "E404"),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            find_by_enrollment_number(&ctx.state, "  "),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn dashboard_counts_from_enrollments() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(10);
        let alice = ctx.create_user("alice", Role::User);
        let bob = ctx.create_user("bob", Role::User);
        ctx.create_user("root", Role::Admin);

        gift(&ctx, "E1", &alice.id, true);
        gift(&ctx, "E2", &alice.id, true);
        // Counter step never ran for this one
        gift(&ctx, "E3", &bob.id, false);
        // Gifter without a user record
        gift(&ctx, "E4", "ghost", false);

        let stats = dashboard_stats(&ctx.state).unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_enrollments, 10);
        assert_eq!(stats.total_gifted, 4);
        assert_eq!(stats.remaining_to_gift, stats.total_enrollments - stats.total_gifted);
        assert_eq!(
            stats.gift_distribution,
            vec![
                GifterCount {
                    user_id: alice.id.clone(),
                    username: "alice".to_string(),
                    count: 2,
                },
                GifterCount {
                    user_id: bob.id.clone(),
                    username: "bob".to_string(),
                    count: 1,
                },
            ]
        );
    }

    #[test]
    fn users_listed_with_their_gifts() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(3);
        let alice = ctx.create_user("alice", Role::User);
        ctx.create_user("bob", Role::User);
        ctx.create_user("root", Role::Admin);
        gift(&ctx, "E1", &alice.id, true);
        gift(&ctx, "E3", &alice.id, true);

        let response = list_users_with_gifts(&ctx.state).unwrap();
        assert_eq!(response.total, 2);

        let alice_row = &response.users[0];
        assert_eq!(alice_row.user.username, "alice");
        assert_eq!(alice_row.user.gifted_count, 2);
        let numbers: Vec<&str> = alice_row
            .gifted_enrollments
            .iter()
            .map(|g| g.enrollment_no.as_str())
            .collect();
        assert_eq!(numbers, vec!["E1", "E3"]);

        assert!(response.users[1].gifted_enrollments.is_empty());
    }
}
