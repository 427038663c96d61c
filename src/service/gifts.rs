// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gift Distribution
//!
//! Records that an enrollment received its gift, exactly once.
//!
//! ## Protocol
//!
//! 1. Check the enrollment exists and is not gifted, and that a non-empty
//!    image was supplied.
//! 2. Upload the proof image. Nothing has been written yet, so a failed
//!    upload leaves the enrollment untouched.
//! 3. Conditional write of the gift record
//!    ([`EnrollmentRepository::mark_gifted`]). Only one concurrent caller
//!    can win; the others get `AlreadyDistributed` naming the winner.
//! 4. Add the gift to the gifter's counter. This step never undoes step 3.
//!    It is idempotent per enrollment and retried a few times; whatever is
//!    left pending is settled by the reconciler.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::ServiceError;
use super::error::DistributionConflict;
use crate::auth::AuthenticatedUser;
use crate::models::{GiftedEnrollment, GifterRef};
use crate::state::AppState;
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, CounterOutcome, EnrollmentRepository,
    GiftCounterRepository, GiftRecord, MarkGiftedOutcome, UserRepository,
};

/// Attempts for the counter step before leaving it to reconciliation.
pub const COUNTER_ATTEMPTS: u32 = 3;

const COUNTER_BACKOFF: Duration = Duration::from_millis(50);

/// Uploaded proof of handover.
#[derive(Debug, Clone)]
pub struct ProofImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Input of [`distribute_gift`].
#[derive(Debug, Clone)]
pub struct DistributeGift {
    pub enrollment_no: String,
    /// Opaque label written next to the gift exactly as supplied
    pub token_number: Option<String>,
    pub image: Option<ProofImage>,
}

/// Record the distribution of the gift for one enrollment.
pub async fn distribute_gift(
    state: &AppState,
    request: DistributeGift,
    actor: &AuthenticatedUser,
) -> Result<GiftedEnrollment, ServiceError> {
    let enrollment_no = request.enrollment_no.trim().to_string();
    if enrollment_no.is_empty() {
        return Err(ServiceError::InvalidInput(
            "Enrollment number is required".to_string(),
        ));
    }

    let enrollments = EnrollmentRepository::new(&state.db);
    let existing = enrollments
        .get(&enrollment_no)?
        .ok_or_else(|| ServiceError::NotFound("Enrollment not found".to_string()))?;

    if let Some(gift) = &existing.gift {
        return Err(reject(state, &enrollment_no, gift, actor));
    }

    let image = validate_image(request.image)?;
    let token_number = request.token_number;

    let card_image = upload(state, image).await?;

    let gift = GiftRecord::new(&actor.user_id, &card_image, token_number);
    let updated = match enrollments.mark_gifted(&enrollment_no, gift)? {
        MarkGiftedOutcome::Marked(enrollment) => enrollment,
        MarkGiftedOutcome::AlreadyGifted(enrollment) => {
            warn!(
                enrollment_no = %enrollment_no,
                orphaned_object = %card_image,
                "Lost distribution race; uploaded image is orphaned"
            );
            let gift = enrollment.gift.as_ref().ok_or_else(|| {
                ServiceError::Internal("gifted enrollment without gift record".to_string())
            })?;
            return Err(reject(state, &enrollment_no, gift, actor));
        }
        MarkGiftedOutcome::NotFound => {
            return Err(ServiceError::NotFound("Enrollment not found".to_string()));
        }
    };

    let Some(gift) = updated.gift.as_ref() else {
        return Err(ServiceError::Internal(
            "marked enrollment without gift record".to_string(),
        ));
    };

    info!(
        enrollment_no = %enrollment_no,
        user_id = %actor.user_id,
        token_number = ?gift.token_number,
        "Gift distributed"
    );
    AuditRepository::new(&state.files).record(
        AuditEvent::new(AuditEventType::GiftDistributed)
            .with_user(&actor.user_id)
            .with_resource("enrollment", &enrollment_no)
            .with_details(serde_json::json!({
                "tokenNumber": gift.token_number,
                "cardImage": gift.card_image,
            })),
    );

    apply_counter(state, &enrollment_no, &actor.user_id).await;

    Ok(GiftedEnrollment {
        enrollment_no: updated.enrollment_no.clone(),
        name: updated.name.clone(),
        is_gifted: true,
        token_number: gift.token_number.clone(),
        gifted_at: gift.gifted_at,
        card_image: gift.card_image.clone(),
    })
}

fn validate_image(image: Option<ProofImage>) -> Result<ProofImage, ServiceError> {
    let Some(image) = image else {
        return Err(ServiceError::InvalidInput("Image is required".to_string()));
    };
    if image.bytes.is_empty() {
        return Err(ServiceError::InvalidInput("Image is empty".to_string()));
    }
    if !image.media_type.trim().to_ascii_lowercase().starts_with("image/") {
        return Err(ServiceError::InvalidInput(format!(
            "Expected an image, got '{}'",
            image.media_type
        )));
    }
    Ok(image)
}

/// Upload on a separate task so it finishes even if the caller goes away.
async fn upload(state: &AppState, image: ProofImage) -> Result<String, ServiceError> {
    let store = state.object_store.clone();
    let size = image.bytes.len();
    let handle =
        tokio::spawn(async move { store.put(image.bytes, &image.media_type).await });

    match handle.await {
        Ok(Ok(url)) => {
            debug!(bytes = size, url = %url, "Proof image stored");
            Ok(url)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Proof image upload failed");
            Err(e.into())
        }
        Err(e) => Err(ServiceError::Internal(format!("upload task failed: {e}"))),
    }
}

/// Build the `AlreadyDistributed` error for an existing gift and audit it.
fn reject(
    state: &AppState,
    enrollment_no: &str,
    gift: &GiftRecord,
    actor: &AuthenticatedUser,
) -> ServiceError {
    let gifter = match UserRepository::new(&state.db).get(&gift.gifted_by) {
        Ok(user) => user,
        Err(e) => {
            warn!(user_id = %gift.gifted_by, error = %e, "Could not resolve gifter");
            None
        }
    };

    AuditRepository::new(&state.files).record(
        AuditEvent::new(AuditEventType::GiftRejected)
            .with_user(&actor.user_id)
            .with_resource("enrollment", enrollment_no)
            .with_details(serde_json::json!({ "giftedBy": gift.gifted_by }))
            .failed("already distributed"),
    );

    ServiceError::AlreadyDistributed(Box::new(DistributionConflict {
        gifted_by: GifterRef {
            user_id: gift.gifted_by.clone(),
            username: gifter.as_ref().map(|u| u.username.clone()),
            token_number: gifter.as_ref().and_then(|u| u.token_number),
        },
        gifted_at: gift.gifted_at,
    }))
}

/// Increment the gifter's counter, retrying transient failures.
async fn apply_counter(state: &AppState, enrollment_no: &str, user_id: &str) {
    let counters = GiftCounterRepository::new(&state.db);
    let mut last_error = String::new();

    for attempt in 1..=COUNTER_ATTEMPTS {
        match counters.apply(enrollment_no) {
            Ok(CounterOutcome::Applied(count)) => {
                debug!(user_id = %user_id, gifted_count = count, "Gift counter updated");
                return;
            }
            Ok(CounterOutcome::AlreadyApplied) => return,
            Ok(outcome @ (CounterOutcome::NotGifted | CounterOutcome::UserMissing)) => {
                last_error = format!("{outcome:?}");
                break;
            }
            Err(e) => {
                warn!(attempt, enrollment_no = %enrollment_no, error = %e, "Gift counter update failed");
                last_error = e.to_string();
                if attempt < COUNTER_ATTEMPTS {
                    tokio::time::sleep(COUNTER_BACKOFF * attempt).await;
                }
            }
        }
    }

    error!(
        enrollment_no = %enrollment_no,
        user_id = %user_id,
        error = %last_error,
        "Gift counter left pending for reconciliation"
    );
    AuditRepository::new(&state.files).record(
        AuditEvent::new(AuditEventType::CounterUpdateFailed)
            .with_user(user_id)
            .with_resource("enrollment", enrollment_no)
            .failed(last_error),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::Role;
    use crate::storage::object_store::testing::{FlakyObjectStore, GatedObjectStore};
    use crate::storage::repository::enrollments::tests::sample_enrollment;
    use crate::storage::{ReconcileReport, StoredUser};
    use crate::test_support::TestContext;

    fn actor(user: &StoredUser) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            expires_at: 0,
        }
    }

    fn png() -> Option<ProofImage> {
        Some(ProofImage {
            bytes: b"\x89PNG fake".to_vec(),
            media_type: "image/png".to_string(),
        })
    }

    fn request(enrollment_no: &str, token: &str) -> DistributeGift {
        DistributeGift {
            enrollment_no: enrollment_no.to_string(),
            token_number: Some(token.to_string()),
            image: png(),
        }
    }

    fn gifted_count(ctx: &TestContext, user: &StoredUser) -> u64 {
        UserRepository::new(&ctx.state.db)
            .get(&user.id)
            .unwrap()
            .unwrap()
            .gifted_count
    }

    #[tokio::test]
    async fn distributes_once_and_counts() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(1);
        let alice = ctx.create_user("alice", Role::User);

        let result = distribute_gift(&ctx.state, request("E1", "T5"), &actor(&alice))
            .await
            .unwrap();

        assert_eq!(result.enrollment_no, "E1");
        assert!(result.is_gifted);
        assert_eq!(result.token_number.as_deref(), Some("T5"));
        assert!(result.card_image.starts_with("https://objects.test/"));
        assert_eq!(gifted_count(&ctx, &alice), 1);
        assert_eq!(ctx.objects.upload_count(), 1);

        let stored = EnrollmentRepository::new(&ctx.state.db).get("E1").unwrap().unwrap();
        let gift = stored.gift.unwrap();
        assert_eq!(gift.gifted_by, alice.id);
        assert!(gift.counter_applied);
    }

    #[tokio::test]
    async fn second_distribution_names_first_gifter() {
        let ctx = TestContext::new();
        ctx.insert_enrollment(sample_enrollment(100, "E100"));
        let a = ctx.create_user("userA", Role::User);
        let b = ctx.create_user("userB", Role::User);

        let first = distribute_gift(&ctx.state, request("E100", "T5"), &actor(&a))
            .await
            .unwrap();
        let err = distribute_gift(&ctx.state, request("E100", "T9"), &actor(&b))
            .await
            .unwrap_err();

        let ServiceError::AlreadyDistributed(conflict) = err else {
            panic!("expected AlreadyDistributed, got {err:?}");
        };
        assert_eq!(conflict.gifted_by.user_id, a.id);
        assert_eq!(conflict.gifted_by.username.as_deref(), Some("userA"));
        assert_eq!(conflict.gifted_at, first.gifted_at);

        // Rejected before upload; the record still carries A's token
        assert_eq!(ctx.objects.upload_count(), 1);
        let stored = EnrollmentRepository::new(&ctx.state.db).get("E100").unwrap().unwrap();
        assert_eq!(stored.gift.unwrap().token_number.as_deref(), Some("T5"));
        assert_eq!(gifted_count(&ctx, &b), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_distributions_have_one_winner() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(1);
        let users: Vec<StoredUser> = (0..8)
            .map(|i| ctx.create_user(&format!("op{i}"), Role::User))
            .collect();

        let state = ctx.state.clone();
        let tasks: Vec<_> = users
            .iter()
            .map(|user| {
                let state = state.clone();
                let caller = actor(user);
                tokio::spawn(async move {
                    distribute_gift(&state, request("E1", "T"), &caller).await
                })
            })
            .collect();

        let mut successes = 0;
        let mut rejections = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(ServiceError::AlreadyDistributed(_)) => rejections += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(rejections, 7);

        let total: u64 = users.iter().map(|u| gifted_count(&ctx, u)).sum();
        assert_eq!(total, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn conditional_write_decides_overlapping_distributions() {
        let store = Arc::new(GatedObjectStore::new(2));
        let ctx = TestContext::with_object_store(store.clone());
        ctx.seed_enrollments(1);
        let a = ctx.create_user("userA", Role::User);
        let b = ctx.create_user("userB", Role::User);

        // Neither upload completes until both callers have passed the
        // already-gifted check, so only mark_gifted can pick the winner.
        let spawn = |user: &StoredUser, token: &'static str| {
            let state = ctx.state.clone();
            let caller = actor(user);
            tokio::spawn(async move { distribute_gift(&state, request("E1", token), &caller).await })
        };
        let first = spawn(&a, "TA");
        let second = spawn(&b, "TB");
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(store.upload_count(), 2);
        let (winner, loser, conflict) = match results {
            [Ok(_), Err(ServiceError::AlreadyDistributed(c))] => (&a, &b, c),
            [Err(ServiceError::AlreadyDistributed(c)), Ok(_)] => (&b, &a, c),
            other => panic!("expected one winner and one conflict, got {other:?}"),
        };

        assert_eq!(conflict.gifted_by.user_id, winner.id);
        assert_eq!(
            conflict.gifted_by.username.as_deref(),
            Some(winner.username.as_str())
        );
        let stored = EnrollmentRepository::new(&ctx.state.db).get("E1").unwrap().unwrap();
        let gift = stored.gift.unwrap();
        assert_eq!(gift.gifted_by, winner.id);
        assert_eq!(conflict.gifted_at, gift.gifted_at);
        assert_eq!(gifted_count(&ctx, winner), 1);
        assert_eq!(gifted_count(&ctx, loser), 0);
    }

    #[tokio::test]
    async fn counter_failure_keeps_gift_for_reconciliation() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(1);
        // Token holder whose user record is not stored yet
        let late = StoredUser::new("late", "hash", Role::User);

        let result = distribute_gift(&ctx.state, request("E1", "T1"), &actor(&late))
            .await
            .unwrap();
        assert!(result.is_gifted);

        let stored = EnrollmentRepository::new(&ctx.state.db).get("E1").unwrap().unwrap();
        let gift = stored.gift.unwrap();
        assert_eq!(gift.gifted_by, late.id);
        assert!(!gift.counter_applied);

        let today = chrono::Utc::now().date_naive();
        let events = AuditRepository::new(&ctx.state.files)
            .read_events_range(today - chrono::Duration::days(1), today)
            .unwrap();
        let failure = events
            .iter()
            .find(|e| e.event_type == AuditEventType::CounterUpdateFailed)
            .expect("counter failure audited");
        assert_eq!(failure.resource_id.as_deref(), Some("E1"));
        assert_eq!(failure.user_id.as_deref(), Some(late.id.as_str()));
        assert!(!failure.success);

        UserRepository::new(&ctx.state.db).create(&late).unwrap();
        let report = GiftCounterRepository::new(&ctx.state.db).reconcile().unwrap();
        assert_eq!(report.pending_gifts_settled, 1);
        assert_eq!(report.corrections.len(), 1);
        assert_eq!(report.corrections[0].cached, 0);
        assert_eq!(report.corrections[0].actual, 1);
        assert_eq!(gifted_count(&ctx, &late), 1);

        let stored = EnrollmentRepository::new(&ctx.state.db).get("E1").unwrap().unwrap();
        assert!(stored.gift.unwrap().counter_applied);
        assert_eq!(
            GiftCounterRepository::new(&ctx.state.db).reconcile().unwrap(),
            ReconcileReport {
                users_checked: 1,
                gifts_counted: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn failed_upload_leaves_enrollment_unchanged() {
        let ctx = TestContext::with_object_store(Arc::new(FlakyObjectStore::failing(1)));
        ctx.seed_enrollments(1);
        let alice = ctx.create_user("alice", Role::User);
        let before = EnrollmentRepository::new(&ctx.state.db).get("E1").unwrap().unwrap();

        let err = distribute_gift(&ctx.state, request("E1", "T1"), &actor(&alice))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StorageUnavailable(_)));

        let after = EnrollmentRepository::new(&ctx.state.db).get("E1").unwrap().unwrap();
        assert_eq!(
            serde_json::to_vec(&before).unwrap(),
            serde_json::to_vec(&after).unwrap()
        );
        assert_eq!(gifted_count(&ctx, &alice), 0);

        // Retry with the store recovered
        distribute_gift(&ctx.state, request("E1", "T1"), &actor(&alice))
            .await
            .unwrap();
        assert_eq!(gifted_count(&ctx, &alice), 1);
    }

    #[tokio::test]
    async fn preconditions_checked_in_order() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(1);
        let alice = ctx.create_user("alice", Role::User);
        let no_image = DistributeGift {
            enrollment_no: "E404".to_string(),
            token_number: None,
            image: None,
        };

        // Unknown enrollment wins over the missing image
        let err = distribute_gift(&ctx.state, no_image, &actor(&alice)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = distribute_gift(
            &ctx.state,
            DistributeGift {
                enrollment_no: "E1".to_string(),
                token_number: None,
                image: None,
            },
            &actor(&alice),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(ctx.objects.upload_count(), 0);
    }

    #[tokio::test]
    async fn non_image_rejected_before_upload() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(1);
        let alice = ctx.create_user("alice", Role::User);

        for (bytes, media_type) in [
            (b"%PDF-1.7".to_vec(), "application/pdf"),
            (Vec::new(), "image/png"),
        ] {
            let req = DistributeGift {
                enrollment_no: "E1".to_string(),
                token_number: None,
                image: Some(ProofImage {
                    bytes,
                    media_type: media_type.to_string(),
                }),
            };
            let err = distribute_gift(&ctx.state, req, &actor(&alice)).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)), "{media_type}: {err:?}");
        }
        assert_eq!(ctx.objects.upload_count(), 0);
        assert!(!EnrollmentRepository::new(&ctx.state.db)
            .get("E1")
            .unwrap()
            .unwrap()
            .is_gifted());
    }

    #[tokio::test]
    async fn token_number_stored_as_sent() {
        let ctx = TestContext::new();
        ctx.seed_enrollments(1);
        let alice = ctx.create_user("alice", Role::User);

        let result = distribute_gift(&ctx.state, request(" E1 ", " T 07 "), &actor(&alice))
            .await
            .unwrap();
        assert_eq!(result.token_number.as_deref(), Some(" T 07 "));

        let stored = EnrollmentRepository::new(&ctx.state.db).get("E1").unwrap().unwrap();
        assert_eq!(stored.gift.unwrap().token_number.as_deref(), Some(" T 07 "));
    }
}
