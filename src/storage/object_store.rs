// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable storage for proof images.
//!
//! Every `put` writes a freshly named object and never replaces an existing
//! one, so a retried upload leaves at most an orphaned object behind.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use url::Url;

use super::{FileStorage, StorageError};

/// Errors from an object store.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("Unsupported media type: {0}")]
    InvalidMediaType(String),

    #[error("Object store unavailable: {0}")]
    Unavailable(String),

    #[error("Object store misconfigured: {0}")]
    Misconfigured(String),
}

/// Blob upload capability.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under a new unique name and return its public URL.
    async fn put(&self, bytes: Vec<u8>, media_type: &str) -> Result<String, ObjectStoreError>;

    /// Short backend name for logs and health output.
    fn kind(&self) -> &'static str;
}

/// File extension for an accepted image media type.
pub fn extension_for(media_type: &str) -> Option<&'static str> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Media type served for a stored object name.
pub fn media_type_for(object_name: &str) -> &'static str {
    match object_name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Generate `{unix_millis}-{uuid}.{ext}` for the media type.
pub fn new_object_name(media_type: &str) -> Result<String, ObjectStoreError> {
    let ext = extension_for(media_type)
        .ok_or_else(|| ObjectStoreError::InvalidMediaType(media_type.to_string()))?;
    Ok(format!(
        "{}-{}.{}",
        Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4(),
        ext
    ))
}

/// Whether `name` looks like something [`new_object_name`] produced.
///
/// Used to reject path tricks before touching the filesystem.
pub fn is_valid_object_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !name.contains("..")
}

// =============================================================================
// Local filesystem
// =============================================================================

/// Object store writing into `{DATA_DIR}/media`, served by `GET /media/{object}`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    storage: FileStorage,
    public_base_url: Option<String>,
}

impl LocalObjectStore {
    pub fn new(storage: FileStorage, public_base_url: Option<String>) -> Self {
        Self {
            storage,
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn url_for(&self, object_name: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/media/{object_name}"),
            None => format!("/media/{object_name}"),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, bytes: Vec<u8>, media_type: &str) -> Result<String, ObjectStoreError> {
        let object_name = new_object_name(media_type)?;
        let path = self.storage.paths().media_object(&object_name);
        let storage = self.storage.clone();

        tokio::task::spawn_blocking(move || storage.write_new(&path, &bytes))
            .await
            .map_err(|e| ObjectStoreError::Unavailable(format!("write task failed: {e}")))?
            .map_err(|e| match e {
                StorageError::NotInitialized => {
                    ObjectStoreError::Misconfigured("media directory not initialized".to_string())
                }
                other => ObjectStoreError::Unavailable(other.to_string()),
            })?;

        Ok(self.url_for(&object_name))
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

// =============================================================================
// Azure Blob Storage
// =============================================================================

/// Object store uploading block blobs with a SAS token.
#[derive(Debug, Clone)]
pub struct AzureBlobObjectStore {
    container_url: Url,
    sas_token: String,
    http: Client,
}

impl AzureBlobObjectStore {
    /// Build a client for `{blob_url}/{container}`.
    pub fn new(blob_url: &str, container: &str, sas_token: &str) -> Result<Self, ObjectStoreError> {
        if container.trim().is_empty() {
            return Err(ObjectStoreError::Misconfigured(
                "container name is empty".to_string(),
            ));
        }
        let sas_token = sas_token.trim().trim_start_matches('?').to_string();
        if sas_token.is_empty() {
            return Err(ObjectStoreError::Misconfigured("SAS token is empty".to_string()));
        }

        let container_url = Url::parse(&format!(
            "{}/{}/",
            blob_url.trim_end_matches('/'),
            container.trim()
        ))
        .map_err(|e| ObjectStoreError::Misconfigured(format!("invalid blob URL: {e}")))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                ObjectStoreError::Misconfigured(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            container_url,
            sas_token,
            http,
        })
    }

    /// Public URL of a blob (without the SAS query).
    pub fn blob_url(&self, object_name: &str) -> Result<Url, ObjectStoreError> {
        self.container_url
            .join(object_name)
            .map_err(|e| ObjectStoreError::Misconfigured(format!("invalid object name: {e}")))
    }
}

#[async_trait]
impl ObjectStore for AzureBlobObjectStore {
    async fn put(&self, bytes: Vec<u8>, media_type: &str) -> Result<String, ObjectStoreError> {
        let object_name = new_object_name(media_type)?;
        let public_url = self.blob_url(&object_name)?;
        let mut upload_url = public_url.clone();
        upload_url.set_query(Some(&self.sas_token));

        let response = self
            .http
            .put(upload_url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("If-None-Match", "*")
            .header(reqwest::header::CONTENT_TYPE, media_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Unavailable(format!("upload request failed: {e}")))?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => Ok(public_url.to_string()),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(%status, object = %object_name, "Blob upload rejected");
                Err(ObjectStoreError::Unavailable(format!(
                    "blob upload returned {status}: {}",
                    body.chars().take(200).collect::<String>()
                )))
            }
        }
    }

    fn kind(&self) -> &'static str {
        "azure"
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn local_store(base: Option<&str>) -> (TempDir, LocalObjectStore) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, LocalObjectStore::new(storage, base.map(String::from)))
    }

    #[test]
    fn extensions_for_image_types() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("IMAGE/PNG"), Some("png"));
        assert_eq!(extension_for("image/webp; charset=binary"), Some("webp"));
        assert_eq!(extension_for("application/pdf"), None);
        assert_eq!(extension_for(""), None);
    }

    #[test]
    fn object_names_are_unique() {
        let a = new_object_name("image/png").unwrap();
        let b = new_object_name("image/png").unwrap();
        assert_ne!(a, b);
        assert!(a.ends_with(".png"));
        assert!(is_valid_object_name(&a));
    }

    #[test]
    fn object_name_validation() {
        assert!(is_valid_object_name("1700000000000-abc.jpg"));
        assert!(!is_valid_object_name("../gifts.redb"));
        assert!(!is_valid_object_name("a/b.png"));
        assert!(!is_valid_object_name(".health_check"));
        assert!(!is_valid_object_name(""));
    }

    #[test]
    fn media_type_round_trips_through_name() {
        let name = new_object_name("image/jpeg").unwrap();
        assert_eq!(media_type_for(&name), "image/jpeg");
        assert_eq!(media_type_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn local_put_writes_new_file() {
        let (temp, store) = local_store(None);

        let url = store.put(b"png bytes".to_vec(), "image/png").await.unwrap();
        let name = url.strip_prefix("/media/").unwrap();

        let written = std::fs::read(temp.path().join("media").join(name)).unwrap();
        assert_eq!(written, b"png bytes");
    }

    #[tokio::test]
    async fn local_put_uses_public_base_url() {
        let (_temp, store) = local_store(Some("https://gifts.example.org/"));
        let url = store.put(b"x".to_vec(), "image/jpeg").await.unwrap();
        assert!(url.starts_with("https://gifts.example.org/media/"));
        assert!(url.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn local_put_rejects_unknown_media_type() {
        let (_temp, store) = local_store(None);
        let result = store.put(b"%PDF".to_vec(), "application/pdf").await;
        assert!(matches!(result, Err(ObjectStoreError::InvalidMediaType(_))));
    }

    #[test]
    fn azure_blob_url_layout() {
        let store = AzureBlobObjectStore::new(
            "https://acct.blob.core.windows.net/",
            "cards",
            "?sv=2024&sig=abc",
        )
        .unwrap();
        let url = store.blob_url("1-x.png").unwrap();
        assert_eq!(url.as_str(), "https://acct.blob.core.windows.net/cards/1-x.png");
    }

    #[test]
    fn azure_requires_sas_token() {
        let result = AzureBlobObjectStore::new("https://acct.blob.core.windows.net", "cards", " ");
        assert!(matches!(result, Err(ObjectStoreError::Misconfigured(_))));
    }
}
