// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Salted password hashing with PBKDF2-HMAC-SHA256.
//!
//! Hashes are stored as `pbkdf2-sha256${iterations}${salt_b64}${hash_b64}` so
//! the iteration count can be raised later without invalidating old hashes.

use std::num::NonZeroU32;

use base64ct::{Base64, Encoding};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use super::AuthError;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Default work factor for new hashes.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Password hasher holding the work factor for new hashes.
#[derive(Clone)]
pub struct PasswordHasher {
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    /// Create a hasher; an iteration count of zero is raised to one.
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: NonZeroU32::new(iterations).unwrap_or(NonZeroU32::MIN),
            rng: SystemRandom::new(),
        }
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let mut salt = [0u8; SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| AuthError::InternalError("salt generation failed".to_string()))?;

        let mut hash = [0u8; HASH_LEN];
        pbkdf2::derive(PBKDF2_ALG, self.iterations, &salt, password.as_bytes(), &mut hash);

        Ok(format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            Base64::encode_string(&salt),
            Base64::encode_string(&hash)
        ))
    }

    /// Check a password against a stored hash.
    ///
    /// Malformed stored hashes never verify.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let Some((iterations, salt, expected)) = parse_stored(stored) else {
            return false;
        };
        pbkdf2::verify(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &expected).is_ok()
    }

    /// Spend the same work as a real verification and return `false`.
    ///
    /// Called when the username is unknown so both login failures cost the
    /// same.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let mut sink = [0u8; HASH_LEN];
        pbkdf2::derive(
            PBKDF2_ALG,
            self.iterations,
            &[0u8; SALT_LEN],
            password.as_bytes(),
            &mut sink,
        );
        false
    }
}

fn parse_stored(stored: &str) -> Option<(NonZeroU32, Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    if parts.next()? != SCHEME {
        return None;
    }
    let iterations = NonZeroU32::new(parts.next()?.parse().ok()?)?;
    let salt = Base64::decode_vec(parts.next()?).ok()?;
    let hash = Base64::decode_vec(parts.next()?).ok()?;
    if parts.next().is_some() || hash.is_empty() {
        return None;
    }
    Some((iterations, salt, hash))
}
