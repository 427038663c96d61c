// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the on-disk data layout.

use std::path::{Path, PathBuf};

/// Default data directory when `DATA_DIR` is not set.
pub const DATA_ROOT: &str = "./data";

/// Storage path utilities for the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persistent data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Database ==========

    /// Path to the embedded redb database file.
    pub fn database_file(&self) -> PathBuf {
        self.root.join("gifts.redb")
    }

    // ========== Media Paths ==========

    /// Directory holding proof images written by the local object store.
    pub fn media_dir(&self) -> PathBuf {
        self.root.join("media")
    }

    /// Path to a stored media object.
    pub fn media_object(&self, object_name: &str) -> PathBuf {
        self.media_dir().join(object_name)
    }

    // ========== Audit Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific day's audit logs.
    pub fn audit_day_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to the events file for a specific day.
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_day_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted() {
        let paths = StoragePaths::new("/srv/gifts");
        assert_eq!(paths.root(), Path::new("/srv/gifts"));
        assert_eq!(paths.database_file(), PathBuf::from("/srv/gifts/gifts.redb"));
        assert_eq!(
            paths.media_object("1700000000000-abc.png"),
            PathBuf::from("/srv/gifts/media/1700000000000-abc.png")
        );
        assert_eq!(
            paths.audit_events_file("2026-01-28"),
            PathBuf::from("/srv/gifts/audit/2026-01-28/events.jsonl")
        );
    }

    #[test]
    fn default_root_is_local_data_dir() {
        assert_eq!(StoragePaths::default().root(), Path::new(DATA_ROOT));
    }
}
