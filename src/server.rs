// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Server Startup
//!
//! Turns an [`AppConfig`] into a running server:
//!
//! 1. Open the data directory and the database, build the object store.
//! 2. Ensure the bootstrap admin exists and import the enrollment seed.
//! 3. Reconcile gift counters once, then keep reconciling in the background.
//! 4. Serve HTTP or HTTPS until the shutdown token is cancelled.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::router;
use crate::auth::TokenIssuer;
use crate::config::{AppConfig, ObjectStoreConfig};
use crate::service::{identity, reconcile_counters, seed, CounterReconciler, ServiceError};
use crate::state::AppState;
use crate::storage::{
    AzureBlobObjectStore, DbError, FileStorage, GiftDatabase, LocalObjectStore, ObjectStore,
    ObjectStoreError, StorageError, StoragePaths,
};
use crate::tls::{load_rustls_config, TlsError};

/// Grace period for in-flight HTTPS connections on shutdown.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Errors that abort startup or serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Data directory error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    #[error("Startup task failed: {0}")]
    Service(#[from] ServiceError),

    #[error("Seed import failed: {0}")]
    Seed(#[from] seed::SeedError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("Invalid bind address {0}")]
    BindAddress(String),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Open storage and assemble the shared state.
pub fn build_state(config: &AppConfig) -> Result<AppState, StartupError> {
    let paths = StoragePaths::new(&config.data_dir);
    let db = GiftDatabase::open(&paths.database_file())?;
    let mut files = FileStorage::new(paths);
    files.initialize()?;

    let object_store: Arc<dyn ObjectStore> = match &config.object_store {
        ObjectStoreConfig::Local => Arc::new(LocalObjectStore::new(
            files.clone(),
            Some(config.public_base_url.clone()),
        )),
        ObjectStoreConfig::Azure {
            blob_url,
            container,
            sas_token,
        } => Arc::new(AzureBlobObjectStore::new(blob_url, container, sas_token)?),
    };

    let tokens = TokenIssuer::new(&config.jwt_secret, config.token_ttl);

    Ok(AppState::new(db, files, object_store, tokens).with_max_upload_bytes(config.max_upload_bytes))
}

/// One-off startup tasks: bootstrap admin, seed import, counter repair.
pub async fn prepare(state: &AppState, config: &AppConfig) -> Result<(), StartupError> {
    if let Some(admin) = &config.bootstrap_admin {
        if identity::ensure_admin(state, &admin.username, &admin.password).await? {
            info!(username = %admin.username, "Bootstrap admin created");
        }
    }

    if let Some(path) = &config.seed_enrollments_path {
        let db = state.db.clone();
        let path = path.clone();
        tokio::task::spawn_blocking(move || seed::import_file(&db, &path))
            .await
            .map_err(|e| ServiceError::Internal(format!("seed task failed: {e}")))??;
    }

    let report = reconcile_counters(state.db.clone(), state.files.clone()).await?;
    info!(
        users = report.users_checked,
        gifts = report.gifts_counted,
        corrections = report.corrections.len(),
        "Startup counter reconciliation finished"
    );

    Ok(())
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    config: &AppConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), StartupError> {
    let bind = config.bind_address();
    let addr: SocketAddr = bind
        .parse()
        .map_err(|_| StartupError::BindAddress(bind.clone()))?;

    if let Some(interval) = config.reconcile_interval {
        let reconciler = CounterReconciler::new(state.db.clone(), state.files.clone(), interval);
        tokio::spawn(reconciler.run(shutdown.clone()));
    } else {
        warn!("Periodic counter reconciliation disabled");
    }

    let app = router(state);

    match &config.tls {
        Some((cert, key)) => {
            let tls_config = load_rustls_config(cert, key).await?;
            let handle = axum_server::Handle::new();

            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                shutdown_handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
            });

            info!(address = %addr, "Gift distribution server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(address = %addr, "Gift distribution server listening on http (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await?;
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
pub async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
