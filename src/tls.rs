// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTPS termination with rustls.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Errors raised while preparing TLS.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Failed to load TLS certificate {cert} / key {key}: {source}")]
    Load {
        cert: String,
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Install the ring crypto provider for rustls.
///
/// Must run before any TLS configuration is built. Repeated calls are
/// harmless.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }
}

/// Load a PEM certificate chain and private key.
pub async fn load_rustls_config(cert: &Path, key: &Path) -> Result<RustlsConfig, TlsError> {
    install_crypto_provider();
    RustlsConfig::from_pem_file(cert, key)
        .await
        .map_err(|source| TlsError::Load {
            cert: cert.display().to_string(),
            key: key.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_rustls_config(&dir.path().join("cert.pem"), &dir.path().join("key.pem"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cert.pem"));
    }
}
