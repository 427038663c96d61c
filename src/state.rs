// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state handed to every handler.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::{PasswordHasher, TokenIssuer};
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::storage::{FileStorage, GiftDatabase, ObjectStore};

#[derive(Clone)]
pub struct AppState {
    /// Users and enrollments
    pub db: Arc<GiftDatabase>,
    /// Data directory (audit logs, local media)
    pub files: Arc<FileStorage>,
    /// Proof image storage
    pub object_store: Arc<dyn ObjectStore>,
    pub tokens: Arc<TokenIssuer>,
    pub passwords: Arc<PasswordHasher>,
    /// Body limit for gift uploads
    pub max_upload_bytes: usize,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        db: GiftDatabase,
        files: FileStorage,
        object_store: Arc<dyn ObjectStore>,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            db: Arc::new(db),
            files: Arc::new(files),
            object_store,
            tokens: Arc::new(tokens),
            passwords: Arc::new(PasswordHasher::default()),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            started_at: Instant::now(),
        }
    }

    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.passwords = Arc::new(hasher);
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
