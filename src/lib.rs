// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gift Distribution Server - Enrollment Gifting Backend
//!
//! Records that each enrolled individual received their gift exactly once,
//! with a proof image and the operator who handed it over.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Password login, bearer tokens and role checks
//! - `service` - Gift distribution, identity, reporting, reconciliation
//! - `storage` - Embedded database, audit log and proof-image stores
//! - `server` - Startup tasks and the HTTP/HTTPS serve loop

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod service;
pub mod state;
pub mod storage;
pub mod tls;

#[cfg(test)]
mod test_support;
