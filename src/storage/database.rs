// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded record database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `usernames`: username → user_id (uniqueness index)
//! - `enrollments`: enrollment_no → serialized StoredEnrollment
//! - `enrollment_order`: composite key (sl_no_be|enrollment_no) → enrollment_no
//!
//! redb admits one write transaction at a time. Every conditional mutation in
//! the repositories reads and writes inside a single write transaction, which
//! makes it a compare-and-set against committed state.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTableMetadata, TableDefinition};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary user table: user_id → StoredUser (JSON bytes).
pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Username uniqueness index: username → user_id.
pub(crate) const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

/// Primary enrollment table: enrollment_no → StoredEnrollment (JSON bytes).
pub(crate) const ENROLLMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("enrollments");

/// Ordering index: `sl_no_be|enrollment_no` → enrollment_no.
pub(crate) const ENROLLMENT_ORDER: TableDefinition<&[u8], &str> =
    TableDefinition::new("enrollment_order");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build the ordering key for an enrollment.
///
/// Format: `sl_no_be_bytes | enrollment_no`. Big-endian sequence numbers sort
/// numerically under byte ordering; the enrollment number breaks ties.
pub(crate) fn make_order_key(sl_no: u64, enrollment_no: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 1 + enrollment_no.len());
    key.extend_from_slice(&sl_no.to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(enrollment_no.as_bytes());
    key
}

// =============================================================================
// GiftDatabase
// =============================================================================

/// Embedded ACID database holding users and enrollments.
pub struct GiftDatabase {
    db: Database,
}

impl GiftDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERNAMES)?;
            let _ = write_txn.open_table(ENROLLMENTS)?;
            let _ = write_txn.open_table(ENROLLMENT_ORDER)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Underlying redb handle for the repositories.
    pub(crate) fn inner(&self) -> &Database {
        &self.db
    }

    /// Verify the database answers a read transaction.
    pub fn health_check(&self) -> DbResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENROLLMENTS)?;
        let _ = table.len()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_file_and_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gifts.redb");
        let db = GiftDatabase::open(&path).unwrap();

        assert!(path.exists());
        db.health_check().unwrap();
    }

    #[test]
    fn reopen_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gifts.redb");
        drop(GiftDatabase::open(&path).unwrap());

        let db = GiftDatabase::open(&path).unwrap();
        db.health_check().unwrap();
    }

    #[test]
    fn order_key_sorts_numerically() {
        let k2 = make_order_key(2, "E900");
        let k10 = make_order_key(10, "E100");
        assert!(k2 < k10, "sequence number dominates ordering");

        let a = make_order_key(7, "E100");
        let b = make_order_key(7, "E101");
        assert!(a < b, "enrollment number breaks ties");
    }
}
