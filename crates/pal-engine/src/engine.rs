//! # Reconciliation Engine
//!
//! Drives registration across the two sources of truth and declares
//! authenticity by comparing them.
//!
//! ## Registration saga
//!
//! ```text
//! validate ─▶ stamp + fingerprint ─▶ Ledger.Exists? ─▶ put marker
//!     ─▶ Ledger.RegisterProduct ─▶ Store.Insert ─▶ clear marker
//! ```
//!
//! The ledger write is the commit point. If it fails definitively
//! (unauthorized, duplicate, invalid), the marker is removed and nothing else
//! happens. If the ledger is unreachable the outcome is unknown, so the
//! marker stays for the sweep. If the store insert fails after the ledger
//! committed, the caller receives [`EngineError::PartialCommit`] and the
//! marker stays; the ledger write is never rolled back.
//!
//! ## Verification
//!
//! Every call re-reads both the store and the ledger. Nothing is cached.
//! The store fingerprint is recomputed from the record's current fields,
//! never taken from its stored `fingerprint` column.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use pal_core::{
    fingerprint, BatchNumber, Clock, ErrorKind, Fingerprint, Identity, ProductFields, ProductId,
    Timestamp,
};
use pal_ledger::{Capability, Ledger};
use pal_store::{MetadataStore, PendingRegistration, PendingRegistrationStore, ProductRecord};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::history::{history_view, HistoryEntry};

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub product_id: ProductId,
    pub fingerprint: Fingerprint,
    pub manufactured_at: Timestamp,
    pub expires_at: Timestamp,
}

/// Outcome of verifying one product.
///
/// Both digests and the record are always present, authentic or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub product_id: ProductId,
    pub is_authentic: bool,
    /// Recomputed from the store's current field values.
    pub store_fingerprint: Fingerprint,
    /// As anchored on the ledger.
    pub ledger_fingerprint: Fingerprint,
    pub record: ProductRecord,
    pub checked_at: Timestamp,
}

/// Orchestrates the ledger and the metadata store.
///
/// All dependencies are passed in; the engine holds no global state.
pub struct ReconciliationEngine {
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) store: Arc<dyn MetadataStore>,
    pub(crate) pending: Arc<dyn PendingRegistrationStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: EngineConfig,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("ledger", &self.ledger.ledger_name())
            .field("store", &self.store.store_name())
            .field("config", &self.config)
            .finish()
    }
}

fn non_blank(operation: &'static str, field: &str, value: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::InvalidArgument {
            operation,
            reason: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

fn parse_product_id(operation: &'static str, raw: &str) -> Result<ProductId, EngineError> {
    ProductId::new(raw).map_err(|e| EngineError::invalid(operation, e))
}

impl ReconciliationEngine {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn MetadataStore>,
        pending: Arc<dyn PendingRegistrationStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger,
            store,
            pending,
            clock,
            config,
        }
    }

    /// Register a product on the ledger and then in the store.
    pub fn register(
        &self,
        caller: &Identity,
        product_id: &str,
        product_type: &str,
        batch_number: &str,
    ) -> Result<RegistrationReceipt, EngineError> {
        const OP: &str = "register";
        let product_id = parse_product_id(OP, product_id)?;
        non_blank(OP, "product_type", product_type)?;
        let batch_number =
            BatchNumber::new(batch_number).map_err(|e| EngineError::invalid(OP, e))?;

        let manufactured_at = self.clock.now();
        let expires_at = self
            .config
            .shelf_life
            .expiry(product_type, manufactured_at)
            .ok_or_else(|| EngineError::InvalidArgument {
                operation: OP,
                reason: format!("expiry for {product_type} is out of range"),
            })?;

        let anchored = fingerprint(&ProductFields {
            product_id: product_id.as_str(),
            product_type,
            batch_number: batch_number.as_str(),
            manufactured_at,
            expires_at,
        });
        let record = ProductRecord {
            product_id: product_id.clone(),
            product_type: product_type.to_string(),
            batch_number,
            manufactured_at,
            expires_at,
            fingerprint: anchored,
        };

        if self.ledger.exists(&product_id)? {
            return Err(EngineError::AlreadyExists { product_id });
        }

        let marker = PendingRegistration::new(record.clone(), manufactured_at);
        if let Err(e) = self.pending.put_pending(&marker) {
            if e.kind() != ErrorKind::Conflict {
                return Err(EngineError::Store(e));
            }
            return Err(self.claimed_elsewhere(product_id, manufactured_at)?);
        }

        if let Err(e) = self
            .ledger
            .register_product(caller, &product_id, &record.fingerprint)
        {
            if e.kind() == ErrorKind::Unavailable {
                tracing::warn!(
                    product_id = %product_id,
                    error = %e,
                    "ledger unreachable during registration; marker kept for reconciliation"
                );
            } else {
                self.clear_marker(&product_id);
            }
            return Err(e.into());
        }

        if let Err(source) = self.store.insert(&record) {
            tracing::error!(
                product_id = %product_id,
                fingerprint = %record.fingerprint,
                error = %source,
                "partial commit: ledger write committed but store insert failed"
            );
            return Err(EngineError::PartialCommit {
                product_id,
                ledger_fingerprint: record.fingerprint,
                source,
            });
        }

        self.clear_marker(&product_id);
        tracing::info!(
            product_id = %product_id,
            fingerprint = %record.fingerprint,
            expires_at = %expires_at,
            "product registered"
        );
        Ok(RegistrationReceipt {
            product_id,
            fingerprint: record.fingerprint,
            manufactured_at,
            expires_at,
        })
    }

    /// Error for a registration whose marker slot is already taken.
    ///
    /// A marker still inside the in-flight window belongs to a concurrent
    /// registration that owns the product id, so the caller sees
    /// `AlreadyExists`. An older marker is left over from an interrupted run
    /// and yields `RegistrationPending` until the sweep settles it.
    fn claimed_elsewhere(
        &self,
        product_id: ProductId,
        now: Timestamp,
    ) -> Result<EngineError, EngineError> {
        if self.ledger.exists(&product_id)? {
            return Ok(EngineError::AlreadyExists { product_id });
        }
        let holder = self
            .pending
            .list_pending()?
            .into_iter()
            .find(|m| m.product_id == product_id);
        Ok(match holder {
            Some(m) if self.is_in_flight(&m, now) => EngineError::AlreadyExists { product_id },
            _ => EngineError::RegistrationPending { product_id },
        })
    }

    pub(crate) fn clear_marker(&self, product_id: &ProductId) {
        if let Err(e) = self.pending.clear_pending(product_id) {
            tracing::warn!(
                product_id = %product_id,
                error = %e,
                "failed to clear pending marker; the reconciliation sweep will retire it"
            );
        }
    }

    /// Recompute the fingerprint from the store and compare it with the
    /// ledger's.
    pub fn verify(&self, product_id: &str) -> Result<VerificationReport, EngineError> {
        let product_id = parse_product_id("verify", product_id)?;
        let record = self.store.get(&product_id)?;
        let ledger_fingerprint = self.ledger.get_fingerprint(&product_id).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                tracing::warn!(
                    product_id = %product_id,
                    "store holds a product the ledger does not know"
                );
            }
            EngineError::Ledger(e)
        })?;
        let store_fingerprint = fingerprint(&record.fields());
        let is_authentic = store_fingerprint.as_str() == ledger_fingerprint.as_str();

        if is_authentic {
            tracing::info!(product_id = %product_id, "product verified authentic");
        } else {
            tracing::warn!(
                product_id = %product_id,
                store_fingerprint = %store_fingerprint,
                ledger_fingerprint = %ledger_fingerprint,
                "fingerprint mismatch: store record diverges from ledger"
            );
        }

        Ok(VerificationReport {
            product_id,
            is_authentic,
            store_fingerprint,
            ledger_fingerprint,
            record,
            checked_at: self.clock.now(),
        })
    }

    /// Append a lifecycle stage.
    pub fn add_stage(
        &self,
        caller: &Identity,
        product_id: &str,
        stage_name: &str,
    ) -> Result<HistoryEntry, EngineError> {
        let product_id = parse_product_id("add_stage", product_id)?;
        non_blank("add_stage", "stage_name", stage_name)?;
        let stage = self.ledger.append_stage(caller, &product_id, stage_name)?;
        Ok(HistoryEntry::from(stage))
    }

    /// The product's stages in ledger order.
    pub fn get_history(&self, product_id: &str) -> Result<Vec<HistoryEntry>, EngineError> {
        let product_id = parse_product_id("get_history", product_id)?;
        Ok(history_view(self.ledger.get_history(&product_id)?))
    }

    /// Grant the administrative capability. Returns `false` if already held.
    pub fn grant_admin(&self, caller: &Identity, identity: &str) -> Result<bool, EngineError> {
        let identity = Identity::new(identity).map_err(|e| EngineError::invalid("grant_admin", e))?;
        Ok(self
            .ledger
            .grant_administrative_capability(caller, &identity)?)
    }

    /// Revoke the administrative capability. Returns `false` if not held.
    pub fn revoke_admin(&self, caller: &Identity, identity: &str) -> Result<bool, EngineError> {
        let identity =
            Identity::new(identity).map_err(|e| EngineError::invalid("revoke_admin", e))?;
        Ok(self
            .ledger
            .revoke_administrative_capability(caller, &identity)?)
    }

    /// Whether `identity` holds the administrative capability.
    pub fn is_admin(&self, identity: &str) -> Result<bool, EngineError> {
        let identity = Identity::new(identity).map_err(|e| EngineError::invalid("is_admin", e))?;
        Ok(self
            .ledger
            .has_capability(&identity, Capability::Administrative)?)
    }
}
