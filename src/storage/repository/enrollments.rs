// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enrollment repository on the redb database.
//!
//! ## Gift State
//!
//! The gift fields of an enrollment (`gifted_by`, `gifted_at`, `card_image`,
//! `token_number`) only ever exist together, so they are stored as one
//! optional [`GiftRecord`]. An enrollment is gifted exactly when the record
//! is present; a half-filled gift state cannot be written.
//!
//! [`EnrollmentRepository::mark_gifted`] is the only writer of that record.
//! It checks and sets inside one write transaction.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};

use crate::storage::database::{
    make_order_key, DbResult, GiftDatabase, ENROLLMENTS, ENROLLMENT_ORDER,
};

/// Evidence of a completed distribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GiftRecord {
    /// Id of the user who handed over the gift
    pub gifted_by: String,
    pub gifted_at: DateTime<Utc>,
    /// URL of the uploaded proof image
    pub card_image: String,
    /// Opaque token label captured at gift time
    #[serde(default)]
    pub token_number: Option<String>,
    /// Whether the gifter's cached counter already includes this gift
    #[serde(default)]
    pub counter_applied: bool,
}

impl GiftRecord {
    pub fn new(
        gifted_by: impl Into<String>,
        card_image: impl Into<String>,
        token_number: Option<String>,
    ) -> Self {
        Self {
            gifted_by: gifted_by.into(),
            gifted_at: Utc::now(),
            card_image: card_image.into(),
            token_number,
            counter_applied: false,
        }
    }
}

/// Enrollment record as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredEnrollment {
    /// Enrollment number (primary key, immutable)
    pub enrollment_no: String,
    /// Sequence number used for list ordering
    pub sl_no: u64,
    /// Registration number
    pub pm_no: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub phone_no_1: Option<String>,
    #[serde(default)]
    pub phone_no_2: Option<String>,
    #[serde(default)]
    pub phone_no_3: Option<String>,
    #[serde(default)]
    pub phone_no_4: Option<String>,
    /// Present once the gift has been distributed
    #[serde(default)]
    pub gift: Option<GiftRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredEnrollment {
    pub fn is_gifted(&self) -> bool {
        self.gift.is_some()
    }
}

/// Result of the conditional gift write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkGiftedOutcome {
    /// The record was not gifted and now carries the new gift.
    Marked(StoredEnrollment),
    /// Another distribution committed first; the stored record is returned
    /// unchanged.
    AlreadyGifted(StoredEnrollment),
    /// No enrollment with that number.
    NotFound,
}

/// Repository for enrollment operations.
pub struct EnrollmentRepository<'a> {
    db: &'a GiftDatabase,
}

impl<'a> EnrollmentRepository<'a> {
    /// Create a new EnrollmentRepository.
    pub fn new(db: &'a GiftDatabase) -> Self {
        Self { db }
    }

    /// Insert an enrollment unless one with the same number exists.
    ///
    /// Returns `true` when the record was inserted.
    pub fn insert_if_absent(&self, enrollment: &StoredEnrollment) -> DbResult<bool> {
        let json = serde_json::to_vec(enrollment)?;
        let order_key = make_order_key(enrollment.sl_no, &enrollment.enrollment_no);

        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(ENROLLMENTS)?;
            if table.get(enrollment.enrollment_no.as_str())?.is_some() {
                return Ok(false);
            }
            table.insert(enrollment.enrollment_no.as_str(), json.as_slice())?;

            let mut order = write_txn.open_table(ENROLLMENT_ORDER)?;
            order.insert(order_key.as_slice(), enrollment.enrollment_no.as_str())?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Look up an enrollment by its number.
    pub fn get(&self, enrollment_no: &str) -> DbResult<Option<StoredEnrollment>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(ENROLLMENTS)?;
        match table.get(enrollment_no)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Total number of enrollments.
    pub fn count(&self) -> DbResult<u64> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(ENROLLMENTS)?;
        Ok(table.len()?)
    }

    /// One page of enrollments ordered by sequence number.
    ///
    /// Both tables are read from the same snapshot, so a page never mixes
    /// states from two commits.
    pub fn list_page(&self, offset: u64, limit: usize) -> DbResult<Vec<StoredEnrollment>> {
        let read_txn = self.db.inner().begin_read()?;
        let order = read_txn.open_table(ENROLLMENT_ORDER)?;
        let table = read_txn.open_table(ENROLLMENTS)?;

        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let mut results = Vec::with_capacity(limit);
        for entry in order.iter()?.skip(skip).take(limit) {
            let (_, enrollment_no) = entry?;
            if let Some(value) = table.get(enrollment_no.value())? {
                results.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(results)
    }

    /// All enrollments, in storage key order.
    pub fn list_all(&self) -> DbResult<Vec<StoredEnrollment>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(ENROLLMENTS)?;

        let mut results = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            results.push(serde_json::from_slice(value.value())?);
        }
        Ok(results)
    }

    /// Gifted enrollments, in storage key order.
    pub fn list_gifted(&self) -> DbResult<Vec<StoredEnrollment>> {
        let mut all = self.list_all()?;
        all.retain(StoredEnrollment::is_gifted);
        Ok(all)
    }

    /// Record a gift if and only if the enrollment is not yet gifted.
    ///
    /// The existence check, the gifted check and the write happen inside a
    /// single write transaction. Concurrent callers are serialized by redb;
    /// the first to commit wins and the rest observe `AlreadyGifted`.
    pub fn mark_gifted(&self, enrollment_no: &str, gift: GiftRecord) -> DbResult<MarkGiftedOutcome> {
        let write_txn = self.db.inner().begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(ENROLLMENTS)?;

            let existing_bytes = match table.get(enrollment_no)? {
                Some(existing) => Some(existing.value().to_vec()),
                None => None,
            };

            match existing_bytes {
                None => MarkGiftedOutcome::NotFound,
                Some(bytes) => {
                    let mut enrollment: StoredEnrollment = serde_json::from_slice(&bytes)?;
                    if enrollment.is_gifted() {
                        MarkGiftedOutcome::AlreadyGifted(enrollment)
                    } else {
                        enrollment.updated_at = gift.gifted_at;
                        enrollment.gift = Some(gift);
                        let json = serde_json::to_vec(&enrollment)?;
                        table.insert(enrollment_no, json.as_slice())?;
                        MarkGiftedOutcome::Marked(enrollment)
                    }
                }
            }
        };

        match outcome {
            MarkGiftedOutcome::Marked(_) => write_txn.commit()?,
            _ => write_txn.abort()?,
        }
        Ok(outcome)
    }
}
