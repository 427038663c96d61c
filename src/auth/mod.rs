// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Username/password login issuing HS256 bearer tokens.
//!
//! ## Auth Flow
//!
//! 1. Client posts credentials to `/api/auth/login`
//! 2. Server verifies the PBKDF2 hash and returns a signed token
//!    (`sub`, `role`, `iat`, `exp`; 24 hours by default)
//! 3. Client sends `Authorization: Bearer <token>` on every API call
//! 4. The [`Auth`] extractor verifies signature and expiry, then loads the
//!    user record; the stored role is the one enforced
//!
//! ## Security
//!
//! - All non-health endpoints require authentication
//! - Wrong password and unknown username fail identically, with the same
//!   hashing cost
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod roles;
pub mod token;

pub use claims::{AuthenticatedUser, TokenClaims};
pub use error::AuthError;
pub use extractor::{authenticate, require_role, AdminOnly, Auth};
pub use password::PasswordHasher;
pub use roles::Role;
pub use token::{IssuedToken, TokenIssuer};
