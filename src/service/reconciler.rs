// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Counter Reconciler
//!
//! The per-user `gifted_count` is a cache. A distribution whose counter
//! step failed leaves it behind the enrollment records, so this task
//! periodically recomputes every counter from the enrollments.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`; the loop exits as soon as
//! the token is cancelled, including while it sleeps.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::ServiceError;
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, FileStorage, GiftCounterRepository, GiftDatabase,
    ReconcileReport,
};

/// Recompute all counters once and audit any change.
pub async fn reconcile_counters(
    db: Arc<GiftDatabase>,
    files: Arc<FileStorage>,
) -> Result<ReconcileReport, ServiceError> {
    let report = tokio::task::spawn_blocking(move || GiftCounterRepository::new(&db).reconcile())
        .await
        .map_err(|e| ServiceError::Internal(format!("reconcile task failed: {e}")))??;

    if report.changed() {
        for correction in &report.corrections {
            warn!(
                user_id = %correction.user_id,
                username = %correction.username,
                cached = correction.cached,
                actual = correction.actual,
                "Corrected gifted counter"
            );
        }
        AuditRepository::new(&files).record(
            AuditEvent::new(AuditEventType::CountersReconciled).with_details(serde_json::json!({
                "usersChecked": report.users_checked,
                "giftsCounted": report.gifts_counted,
                "pendingGiftsSettled": report.pending_gifts_settled,
                "corrections": report.corrections,
            })),
        );
    }

    Ok(report)
}

/// Background task that runs [`reconcile_counters`] on an interval.
pub struct CounterReconciler {
    db: Arc<GiftDatabase>,
    files: Arc<FileStorage>,
    interval: Duration,
}

impl CounterReconciler {
    pub fn new(db: Arc<GiftDatabase>, files: Arc<FileStorage>, interval: Duration) -> Self {
        Self { db, files, interval }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// ```rust,ignore
    /// tokio::spawn(reconciler.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Counter reconciler starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Counter reconciler shutting down");
                    return;
                }
            }

            self.step().await;
        }
    }

    async fn step(&self) {
        match reconcile_counters(self.db.clone(), self.files.clone()).await {
            Ok(report) if !report.changed() => {}
            Ok(report) => {
                info!(
                    corrections = report.corrections.len(),
                    pending_settled = report.pending_gifts_settled,
                    "Counter reconciliation applied changes"
                );
            }
            Err(e) => warn!(error = %e, "Counter reconciliation failed"),
        }
    }
}
