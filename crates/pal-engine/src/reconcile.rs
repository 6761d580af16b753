//! # Reconciliation Sweep
//!
//! Walks every pending-registration marker and settles it against the
//! ledger and the store:
//!
//! | Ledger has product | Ledger fingerprint | Store row | Action                 | Outcome             |
//! |--------------------|--------------------|-----------|------------------------|---------------------|
//! | no                 | n/a                | n/a       | clear marker           | `Abandoned`         |
//! | yes                | differs            | n/a       | keep marker            | `Flagged`           |
//! | yes                | matches            | present   | clear marker           | `AlreadyConsistent` |
//! | yes                | matches            | absent    | insert, clear marker   | `Replayed`          |
//!
//! Markers younger than `reconcile.min_marker_age_secs` are skipped as
//! `InFlight`. Any boundary failure while settling a marker yields `Failed`
//! and keeps the marker; the sweep carries on with the next one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pal_core::{ErrorKind, Fingerprint, ProductId, Timestamp};
use pal_store::PendingRegistration;

use crate::engine::ReconciliationEngine;
use crate::error::EngineError;

/// What the sweep did with one marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// The ledger never committed; the marker was discarded.
    Abandoned,
    /// The missing store row was written from the marker.
    Replayed,
    /// Both sides already held the product; the marker was discarded.
    AlreadyConsistent,
    /// The ledger anchors a different fingerprint. Needs an operator.
    Flagged { ledger_fingerprint: Fingerprint },
    /// Too recent to judge.
    InFlight,
    /// A boundary call failed; retried on the next sweep.
    Failed { error: String },
}

impl ReconciliationOutcome {
    /// Whether the marker still needs attention after this sweep.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            Self::Flagged { .. } | Self::InFlight | Self::Failed { .. }
        )
    }
}

/// One settled marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledMarker {
    pub product_id: ProductId,
    pub fingerprint: Fingerprint,
    #[serde(flatten)]
    pub outcome: ReconciliationOutcome,
}

/// Result of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub sweep_id: Uuid,
    pub started_at: Timestamp,
    pub markers: Vec<ReconciledMarker>,
}

impl ReconciliationReport {
    /// Whether every marker was resolved.
    pub fn is_clean(&self) -> bool {
        !self.markers.iter().any(|m| m.outcome.is_unresolved())
    }

    /// Number of markers with the given outcome discriminant.
    pub fn count(&self, matches: impl Fn(&ReconciliationOutcome) -> bool) -> usize {
        self.markers.iter().filter(|m| matches(&m.outcome)).count()
    }
}

impl ReconciliationEngine {
    /// Settle every pending-registration marker.
    ///
    /// Fails only if the markers cannot be listed.
    pub fn reconcile(&self) -> Result<ReconciliationReport, EngineError> {
        let sweep_id = Uuid::new_v4();
        let started_at = self.clock.now();
        let markers = self.pending.list_pending()?;
        tracing::info!(%sweep_id, markers = markers.len(), "reconciliation sweep started");

        let mut settled = Vec::with_capacity(markers.len());
        for marker in markers {
            let outcome = if self.is_in_flight(&marker, started_at) {
                ReconciliationOutcome::InFlight
            } else {
                self.settle(&marker).unwrap_or_else(|e| {
                    tracing::error!(
                        %sweep_id,
                        product_id = %marker.product_id,
                        error = %e,
                        "failed to settle pending registration"
                    );
                    ReconciliationOutcome::Failed {
                        error: e.to_string(),
                    }
                })
            };
            if let ReconciliationOutcome::Flagged { ledger_fingerprint } = &outcome {
                tracing::warn!(
                    %sweep_id,
                    product_id = %marker.product_id,
                    marker_fingerprint = %marker.fingerprint,
                    ledger_fingerprint = %ledger_fingerprint,
                    "pending registration disagrees with ledger"
                );
            }
            settled.push(ReconciledMarker {
                product_id: marker.product_id,
                fingerprint: marker.fingerprint,
                outcome,
            });
        }

        let report = ReconciliationReport {
            sweep_id,
            started_at,
            markers: settled,
        };
        tracing::info!(%sweep_id, clean = report.is_clean(), "reconciliation sweep finished");
        Ok(report)
    }

    pub(crate) fn is_in_flight(&self, marker: &PendingRegistration, now: Timestamp) -> bool {
        let age = now.epoch_secs().saturating_sub(marker.created_at.epoch_secs());
        age < 0 || (age as u64) < self.config.reconcile.min_marker_age_secs
    }

    fn settle(&self, marker: &PendingRegistration) -> Result<ReconciliationOutcome, EngineError> {
        let product_id = &marker.product_id;
        if !self.ledger.exists(product_id)? {
            self.pending.clear_pending(product_id)?;
            tracing::info!(product_id = %product_id, "abandoned pending registration cleared");
            return Ok(ReconciliationOutcome::Abandoned);
        }

        let ledger_fingerprint = self.ledger.get_fingerprint(product_id)?;
        if ledger_fingerprint != marker.fingerprint {
            return Ok(ReconciliationOutcome::Flagged { ledger_fingerprint });
        }

        let outcome = match self.store.get(product_id) {
            Ok(_) => ReconciliationOutcome::AlreadyConsistent,
            Err(e) if e.kind() == ErrorKind::NotFound => match self.store.insert(&marker.record) {
                Ok(()) => ReconciliationOutcome::Replayed,
                Err(e) if e.kind() == ErrorKind::Conflict => {
                    ReconciliationOutcome::AlreadyConsistent
                }
                Err(e) => return Err(e.into()),
            },
            Err(e) => return Err(e.into()),
        };
        self.pending.clear_pending(product_id)?;
        tracing::info!(product_id = %product_id, ?outcome, "pending registration settled");
        Ok(outcome)
    }
}
