// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enrollment import from a JSON array.
//!
//! Field names follow the source spreadsheet export (`"sl no"`,
//! `"enrollment no"`, ...). Numbers and strings are both accepted for the
//! registration and phone columns. Existing enrollment numbers are skipped,
//! so re-running an import is harmless.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{info, warn};

use crate::storage::{DbError, EnrollmentRepository, GiftDatabase, StoredEnrollment};

/// Errors raised while importing enrollments.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// One row of the seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEnrollment {
    #[serde(rename = "sl no")]
    pub sl_no: u64,
    #[serde(rename = "pm no", deserialize_with = "text")]
    pub pm_no: String,
    #[serde(rename = "enrollment no", deserialize_with = "text")]
    pub enrollment_no: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(rename = "phone no 1", default, deserialize_with = "optional_text")]
    pub phone_no_1: Option<String>,
    #[serde(rename = "phone no 2", default, deserialize_with = "optional_text")]
    pub phone_no_2: Option<String>,
    #[serde(rename = "phone no 3", default, deserialize_with = "optional_text")]
    pub phone_no_3: Option<String>,
    #[serde(rename = "phone no 4", default, deserialize_with = "optional_text")]
    pub phone_no_4: Option<String>,
}

impl SeedEnrollment {
    fn into_stored(self) -> StoredEnrollment {
        let now = Utc::now();
        StoredEnrollment {
            enrollment_no: self.enrollment_no.trim().to_string(),
            sl_no: self.sl_no,
            pm_no: self.pm_no,
            name: self.name.trim().to_string(),
            address: self.address,
            phone_no_1: self.phone_no_1,
            phone_no_2: self.phone_no_2,
            phone_no_3: self.phone_no_3,
            phone_no_4: self.phone_no_4,
            gift: None,
            created_at: now,
            updated_at: now,
        }
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_text(value).ok_or_else(|| serde::de::Error::custom("expected a non-empty string or number"))
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_text(Value::deserialize(deserializer)?))
}

/// Parse a seed document.
pub fn parse_enrollments(json: &str) -> Result<Vec<SeedEnrollment>, SeedError> {
    Ok(serde_json::from_str(json)?)
}

/// Insert every row whose enrollment number is not stored yet.
pub fn import_enrollments(db: &GiftDatabase, rows: Vec<SeedEnrollment>) -> Result<ImportSummary, SeedError> {
    let repo = EnrollmentRepository::new(db);
    let mut summary = ImportSummary::default();

    for row in rows {
        let enrollment = row.into_stored();
        if enrollment.enrollment_no.is_empty() {
            warn!(sl_no = enrollment.sl_no, "Skipping seed row without enrollment number");
            summary.skipped += 1;
            continue;
        }
        if repo.insert_if_absent(&enrollment)? {
            summary.inserted += 1;
        } else {
            summary.skipped += 1;
        }
    }

    Ok(summary)
}

/// Read `path` and import its rows.
pub fn import_file(db: &GiftDatabase, path: &Path) -> Result<ImportSummary, SeedError> {
    let json = std::fs::read_to_string(path)?;
    let rows = parse_enrollments(&json)?;
    let summary = import_enrollments(db, rows)?;
    info!(
        path = %path.display(),
        inserted = summary.inserted,
        skipped = summary.skipped,
        "Enrollment seed imported"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"[
        {
            "sl no": 1,
            "pm no": 4411,
            "enrollment no": "E1",
            "name": "Asha Devi",
            "phone no 1": 9876543210,
            "phone no 2": "",
            "address": "Ward 3"
        },
        {
            "sl no": 2,
            "pm no": "PM-2",
            "enrollment no": "E2",
            "name": "Ravi Kumar",
            "phone no 1": "0700000001",
            "address": "Ward 5"
        }
    ]"#;

    fn temp_db() -> (GiftDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = GiftDatabase::open(&dir.path().join("seed.redb")).unwrap();
        (db, dir)
    }

    #[test]
    fn parses_mixed_column_types() {
        let rows = parse_enrollments(SEED).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pm_no, "4411");
        assert_eq!(rows[0].phone_no_1.as_deref(), Some("9876543210"));
        assert_eq!(rows[0].phone_no_2, None);
        assert_eq!(rows[0].phone_no_3, None);
        assert_eq!(rows[1].pm_no, "PM-2");
    }

    #[test]
    fn import_is_idempotent() {
        let (db, _dir) = temp_db();

        let first = import_enrollments(&db, parse_enrollments(SEED).unwrap()).unwrap();
        assert_eq!(first, ImportSummary { inserted: 2, skipped: 0 });

        let second = import_enrollments(&db, parse_enrollments(SEED).unwrap()).unwrap();
        assert_eq!(second, ImportSummary { inserted: 0, skipped: 2 });

        let repo = EnrollmentRepository::new(&db);
        assert_eq!(repo.count().unwrap(), 2);
        let stored = repo.get("E1").unwrap().unwrap();
        assert_eq!(stored.name, "Asha Devi");
        assert!(!stored.is_gifted());
    }

    #[test]
    fn import_file_reads_from_disk() {
        let (db, dir) = temp_db();
        let path = dir.path().join("enrollments.json");
        std::fs::write(&path, SEED).unwrap();

        let summary = import_file(&db, &path).unwrap();
        assert_eq!(summary.inserted, 2);
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(matches!(
            parse_enrollments(r#"[{"sl no": 1}]"#),
            Err(SeedError::Parse(_))
        ));
    }
}
