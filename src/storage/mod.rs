// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives under the configured data directory:
//!
//! ```text
//! {DATA_DIR}/
//!   gifts.redb                # users + enrollments (redb, ACID)
//!   media/
//!     {millis}-{uuid}.{ext}   # proof images (local object store)
//!   audit/
//!     {date}/events.jsonl     # daily audit logs
//! ```
//!
//! Records that take part in the gift protocol are kept in redb so that
//! the conditional gift write and the counter maintenance run as single
//! serialized transactions. Proof images go through an [`ObjectStore`]
//! implementation; the local one writes into `media/`.

pub mod audit;
pub mod database;
pub mod file_store;
pub mod object_store;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use database::{DbError, DbResult, GiftDatabase};
pub use file_store::{FileStorage, StorageError, StorageResult};
pub use object_store::{AzureBlobObjectStore, LocalObjectStore, ObjectStore, ObjectStoreError};
pub use paths::StoragePaths;
pub use repository::{
    CounterCorrection, CounterOutcome, EnrollmentRepository, GiftCounterRepository, GiftRecord,
    MarkGiftedOutcome, ReconcileReport, StoredEnrollment, StoredUser, UserRepository,
};
