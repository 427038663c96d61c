// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests.

use std::sync::Arc;

use tempfile::TempDir;

use crate::auth::{PasswordHasher, Role, TokenIssuer};
use crate::state::AppState;
use crate::storage::object_store::testing::RecordingObjectStore;
use crate::storage::repository::enrollments::tests::sample_enrollment;
use crate::storage::{
    EnrollmentRepository, FileStorage, GiftDatabase, ObjectStore, StoragePaths, StoredEnrollment,
    StoredUser, UserRepository,
};

pub(crate) const TEST_SECRET: &[u8] = b"test-secret-test-secret-test-sec";
pub(crate) const TEST_PASSWORD: &str = "password123";

/// A state over a throwaway data directory.
pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) objects: Arc<RecordingObjectStore>,
    _temp: TempDir,
}

impl TestContext {
    pub(crate) fn new() -> Self {
        let objects = Arc::new(RecordingObjectStore::default());
        Self::build(objects.clone(), objects)
    }

    /// Use `store` for uploads; `objects` stays empty.
    pub(crate) fn with_object_store(store: Arc<dyn ObjectStore>) -> Self {
        Self::build(store, Arc::new(RecordingObjectStore::default()))
    }

    fn build(store: Arc<dyn ObjectStore>, objects: Arc<RecordingObjectStore>) -> Self {
        let temp = TempDir::new().unwrap();
        let paths = StoragePaths::new(temp.path());
        let db = GiftDatabase::open(&paths.database_file()).unwrap();
        let mut files = FileStorage::new(paths);
        files.initialize().unwrap();

        let state = AppState::new(
            db,
            files,
            store,
            TokenIssuer::new(TEST_SECRET, chrono::Duration::hours(24)),
        )
        .with_password_hasher(PasswordHasher::new(1_000));

        Self {
            state,
            objects,
            _temp: temp,
        }
    }

    /// Insert a user whose password is [`TEST_PASSWORD`].
    pub(crate) fn create_user(&self, username: &str, role: Role) -> StoredUser {
        let hash = self.state.passwords.hash(TEST_PASSWORD).unwrap();
        let user = StoredUser::new(username, hash, role);
        UserRepository::new(&self.state.db).create(&user).unwrap();
        user
    }

    pub(crate) fn token_for(&self, user: &StoredUser) -> String {
        self.state.tokens.issue(&user.id, user.role).unwrap().token
    }

    /// Insert enrollments `E1..=En` with matching sequence numbers.
    pub(crate) fn seed_enrollments(&self, n: u64) {
        for i in 1..=n {
            self.insert_enrollment(sample_enrollment(i, &format!("E{i}")));
        }
    }

    pub(crate) fn insert_enrollment(&self, enrollment: StoredEnrollment) {
        EnrollmentRepository::new(&self.state.db)
            .insert_if_absent(&enrollment)
            .unwrap();
    }
}
