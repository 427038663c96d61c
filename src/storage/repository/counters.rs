// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Maintenance of the per-user `gifted_count` cache.
//!
//! The counter is derived data: the number of gifted enrollments whose
//! `gifted_by` is the user. It is applied after the gift itself commits, so
//! it can lag behind. Each gift carries a `counter_applied` flag that is
//! flipped in the same transaction as the increment, which makes
//! [`GiftCounterRepository::apply`] idempotent and lets
//! [`GiftCounterRepository::reconcile`] run concurrently with distributions
//! without double counting.

use std::collections::{BTreeMap, HashMap};

use redb::ReadableTable;
use serde::Serialize;
use utoipa::ToSchema;

use super::enrollments::StoredEnrollment;
use super::users::StoredUser;
use crate::storage::database::{DbResult, GiftDatabase, ENROLLMENTS, USERS};

/// Result of applying one gift to its gifter's counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterOutcome {
    /// Counter incremented; carries the new value.
    Applied(u64),
    /// The gift was already counted (by an earlier attempt or a reconcile).
    AlreadyApplied,
    /// The enrollment does not exist or is not gifted.
    NotGifted,
    /// The gifter's user record is missing.
    UserMissing,
}

/// A counter that was corrected by reconciliation.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CounterCorrection {
    pub user_id: String,
    pub username: String,
    /// Cached value before reconciliation
    pub cached: u64,
    /// Value recomputed from enrollments
    pub actual: u64,
}

/// Summary of a reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub users_checked: usize,
    pub gifts_counted: u64,
    /// Gifts whose counter flag was still pending
    pub pending_gifts_settled: usize,
    pub corrections: Vec<CounterCorrection>,
}

impl ReconcileReport {
    /// Whether the pass wrote anything.
    pub fn changed(&self) -> bool {
        !self.corrections.is_empty() || self.pending_gifts_settled > 0
    }
}

/// Repository for gift counter maintenance.
pub struct GiftCounterRepository<'a> {
    db: &'a GiftDatabase,
}

impl<'a> GiftCounterRepository<'a> {
    pub fn new(db: &'a GiftDatabase) -> Self {
        Self { db }
    }

    /// Add the gift on `enrollment_no` to its gifter's counter, once.
    pub fn apply(&self, enrollment_no: &str) -> DbResult<CounterOutcome> {
        let write_txn = self.db.inner().begin_write()?;
        let outcome = {
            let mut enrollments = write_txn.open_table(ENROLLMENTS)?;
            let mut users = write_txn.open_table(USERS)?;

            let enrollment_bytes = match enrollments.get(enrollment_no)? {
                Some(value) => Some(value.value().to_vec()),
                None => None,
            };
            let Some(enrollment_bytes) = enrollment_bytes else {
                return Ok(CounterOutcome::NotGifted);
            };
            let mut enrollment: StoredEnrollment = serde_json::from_slice(&enrollment_bytes)?;

            let Some(gift) = enrollment.gift.as_mut() else {
                return Ok(CounterOutcome::NotGifted);
            };
            if gift.counter_applied {
                return Ok(CounterOutcome::AlreadyApplied);
            }

            let user_bytes = match users.get(gift.gifted_by.as_str())? {
                Some(value) => Some(value.value().to_vec()),
                None => None,
            };
            let Some(user_bytes) = user_bytes else {
                return Ok(CounterOutcome::UserMissing);
            };
            let mut user: StoredUser = serde_json::from_slice(&user_bytes)?;

            gift.counter_applied = true;
            user.gifted_count += 1;
            user.updated_at = chrono::Utc::now();

            let user_json = serde_json::to_vec(&user)?;
            users.insert(user.id.as_str(), user_json.as_slice())?;
            let enrollment_json = serde_json::to_vec(&enrollment)?;
            enrollments.insert(enrollment_no, enrollment_json.as_slice())?;

            CounterOutcome::Applied(user.gifted_count)
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Recompute every user's counter from the enrollment table.
    ///
    /// Runs in one write transaction: counts gifted enrollments per gifter,
    /// marks every gift as counted and rewrites counters that disagree.
    pub fn reconcile(&self) -> DbResult<ReconcileReport> {
        let write_txn = self.db.inner().begin_write()?;
        let report = {
            let mut enrollments = write_txn.open_table(ENROLLMENTS)?;
            let mut users = write_txn.open_table(USERS)?;

            let mut actual: HashMap<String, u64> = HashMap::new();
            let mut pending: Vec<StoredEnrollment> = Vec::new();
            let mut gifts_counted = 0u64;

            for entry in enrollments.iter()? {
                let (_, value) = entry?;
                let enrollment: StoredEnrollment = serde_json::from_slice(value.value())?;
                if let Some(gift) = &enrollment.gift {
                    *actual.entry(gift.gifted_by.clone()).or_default() += 1;
                    gifts_counted += 1;
                    if !gift.counter_applied {
                        pending.push(enrollment);
                    }
                }
            }

            let mut stored_users: BTreeMap<String, StoredUser> = BTreeMap::new();
            for entry in users.iter()? {
                let (_, value) = entry?;
                let user: StoredUser = serde_json::from_slice(value.value())?;
                stored_users.insert(user.username.clone(), user);
            }

            let pending_gifts_settled = pending.len();
            for mut enrollment in pending {
                if let Some(gift) = enrollment.gift.as_mut() {
                    gift.counter_applied = true;
                }
                let json = serde_json::to_vec(&enrollment)?;
                enrollments.insert(enrollment.enrollment_no.as_str(), json.as_slice())?;
            }

            let users_checked = stored_users.len();
            let mut corrections = Vec::new();
            for (_, mut user) in stored_users {
                let expected = actual.get(&user.id).copied().unwrap_or(0);
                if user.gifted_count != expected {
                    corrections.push(CounterCorrection {
                        user_id: user.id.clone(),
                        username: user.username.clone(),
                        cached: user.gifted_count,
                        actual: expected,
                    });
                    user.gifted_count = expected;
                    user.updated_at = chrono::Utc::now();
                    let json = serde_json::to_vec(&user)?;
                    users.insert(user.id.as_str(), json.as_slice())?;
                }
            }

            ReconcileReport {
                users_checked,
                gifts_counted,
                pending_gifts_settled,
                corrections,
            }
        };
        write_txn.commit()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::storage::repository::enrollments::tests::sample_enrollment;
    use crate::storage::repository::{EnrollmentRepository, GiftRecord, UserRepository};

    #[test]
    fn report_changed_when_anything_settled() {
        assert!(!ReconcileReport::default().changed());

        let settled_only = ReconcileReport {
            pending_gifts_settled: 1,
            ..Default::default()
        };
        assert!(settled_only.changed());
    }

    fn setup() -> (GiftDatabase, tempfile::TempDir, StoredUser) {
        let dir = tempfile::tempdir().unwrap();
        let db = GiftDatabase::open(&dir.path().join("test.redb")).unwrap();
        let user = StoredUser::new("alice", "hash", Role::User);
        UserRepository::new(&db).create(&user).unwrap();
        let enrollments = EnrollmentRepository::new(&db);
        for i in 1..=3 {
            enrollments
                .insert_if_absent(&sample_enrollment(i, &format!("E{i}")))
                .unwrap();
        }
        (db, dir, user)
    }

    fn gift(db: &GiftDatabase, enrollment_no: &str, user_id: &str) {
        EnrollmentRepository::new(db)
            .mark_gifted(enrollment_no, GiftRecord::new(user_id, "https://cdn/p.png", None))
            .unwrap();
    }

    #[test]
    fn apply_increments_once() {
        let (db, _dir, user) = setup();
        gift(&db, "E1", &user.id);
        let counters = GiftCounterRepository::new(&db);

        assert_eq!(counters.apply("E1").unwrap(), CounterOutcome::Applied(1));
        assert_eq!(counters.apply("E1").unwrap(), CounterOutcome::AlreadyApplied);

        let stored = UserRepository::new(&db).get(&user.id).unwrap().unwrap();
        assert_eq!(stored.gifted_count, 1);
    }

    #[test]
    fn apply_on_ungifted_enrollment() {
        let (db, _dir, _user) = setup();
        let counters = GiftCounterRepository::new(&db);

        assert_eq!(counters.apply("E2").unwrap(), CounterOutcome::NotGifted);
        assert_eq!(counters.apply("E404").unwrap(), CounterOutcome::NotGifted);
    }

    #[test]
    fn apply_with_missing_user_leaves_flag_pending() {
        let (db, _dir, _user) = setup();
        gift(&db, "E1", "ghost");
        let counters = GiftCounterRepository::new(&db);

        assert_eq!(counters.apply("E1").unwrap(), CounterOutcome::UserMissing);
        let enrollment = EnrollmentRepository::new(&db).get("E1").unwrap().unwrap();
        assert!(!enrollment.gift.unwrap().counter_applied);
    }

    #[test]
    fn reconcile_repairs_interrupted_increment() {
        let (db, _dir, user) = setup();
        let counters = GiftCounterRepository::new(&db);

        gift(&db, "E1", &user.id);
        counters.apply("E1").unwrap();
        // E2 committed but its counter step never ran
        gift(&db, "E2", &user.id);

        let report = counters.reconcile().unwrap();
        assert_eq!(report.users_checked, 1);
        assert_eq!(report.gifts_counted, 2);
        assert_eq!(report.pending_gifts_settled, 1);
        assert_eq!(
            report.corrections,
            vec![CounterCorrection {
                user_id: user.id.clone(),
                username: "alice".to_string(),
                cached: 1,
                actual: 2,
            }]
        );

        // A late retry of the interrupted step must not double count
        assert_eq!(counters.apply("E2").unwrap(), CounterOutcome::AlreadyApplied);
        let stored = UserRepository::new(&db).get(&user.id).unwrap().unwrap();
        assert_eq!(stored.gifted_count, 2);
    }

    #[test]
    fn reconcile_is_noop_when_consistent() {
        let (db, _dir, user) = setup();
        let counters = GiftCounterRepository::new(&db);
        gift(&db, "E3", &user.id);
        counters.apply("E3").unwrap();

        let report = counters.reconcile().unwrap();
        assert!(report.corrections.is_empty());
        assert_eq!(report.pending_gifts_settled, 0);
    }
}
