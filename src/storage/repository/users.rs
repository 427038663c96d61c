// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository on the redb database.
//!
//! Users are keyed by a UUID. A second table maps usernames to ids and is
//! written in the same transaction as the user record, so two concurrent
//! creations of the same username cannot both commit.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::storage::database::{DbError, DbResult, GiftDatabase, USERNAMES, USERS};

/// User record as persisted.
///
/// Never serialized to API clients directly: it carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    /// Unique user identifier (UUID)
    pub id: String,
    /// Login name, unique across all users
    pub username: String,
    /// Salted PBKDF2 hash in `pbkdf2-sha256$iter$salt$hash` form
    pub password_hash: String,
    pub role: Role,
    /// Cached number of distributions recorded by this user
    #[serde(default)]
    pub gifted_count: u64,
    /// Token number assigned to the operator, if any
    #[serde(default)]
    pub token_number: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredUser {
    /// Build a fresh user record with a zero counter.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            password_hash: password_hash.into(),
            role,
            gifted_count: 0,
            token_number: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    db: &'a GiftDatabase,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository.
    pub fn new(db: &'a GiftDatabase) -> Self {
        Self { db }
    }

    /// Insert a new user.
    ///
    /// Returns `DbError::AlreadyExists` when the username is taken.
    pub fn create(&self, user: &StoredUser) -> DbResult<()> {
        let json = serde_json::to_vec(user)?;

        let write_txn = self.db.inner().begin_write()?;
        {
            let mut names = write_txn.open_table(USERNAMES)?;
            if names.get(user.username.as_str())?.is_some() {
                return Err(DbError::AlreadyExists(format!("User {}", user.username)));
            }
            names.insert(user.username.as_str(), user.id.as_str())?;

            let mut users = write_txn.open_table(USERS)?;
            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a user by id.
    pub fn get(&self, user_id: &str) -> DbResult<Option<StoredUser>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a user by username.
    pub fn get_by_username(&self, username: &str) -> DbResult<Option<StoredUser>> {
        let read_txn = self.db.inner().begin_read()?;
        let names = read_txn.open_table(USERNAMES)?;
        let user_id = match names.get(username)? {
            Some(id) => id.value().to_string(),
            None => return Ok(None),
        };

        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// List all users ordered by username.
    pub fn list_all(&self) -> DbResult<Vec<StoredUser>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(USERS)?;

        let mut users = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let user: StoredUser = serde_json::from_slice(value.value())?;
            users.push(user);
        }
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    /// List users holding the given role, ordered by username.
    pub fn list_by_role(&self, role: Role) -> DbResult<Vec<StoredUser>> {
        let mut users = self.list_all()?;
        users.retain(|u| u.role == role);
        Ok(users)
    }
}
