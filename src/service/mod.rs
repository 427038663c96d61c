// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Services
//!
//! Business operations behind the HTTP handlers. Every function takes the
//! shared [`AppState`](crate::state::AppState) and returns a
//! [`ServiceError`] that the API layer maps onto a response.
//!
//! - [`gifts`]: the gift distribution protocol
//! - [`identity`]: account creation and login
//! - [`reporting`]: enrollment lookup, listing and dashboard figures
//! - [`reconciler`]: gifter counter repair
//! - [`seed`]: enrollment import from a JSON file

pub mod error;
pub mod gifts;
pub mod identity;
pub mod reconciler;
pub mod reporting;
pub mod seed;

pub use error::{DistributionConflict, ServiceError};
pub use reconciler::{reconcile_counters, CounterReconciler};
