// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the record database.
//!
//! Each repository borrows the shared [`GiftDatabase`](super::GiftDatabase)
//! and runs every operation in its own redb transaction.

pub mod counters;
pub mod enrollments;
pub mod users;

pub use counters::{CounterCorrection, CounterOutcome, GiftCounterRepository, ReconcileReport};
pub use enrollments::{EnrollmentRepository, GiftRecord, MarkGiftedOutcome, StoredEnrollment};
pub use users::{StoredUser, UserRepository};
