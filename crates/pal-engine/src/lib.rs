//! # pal-engine — Authenticity Reconciliation Engine
//!
//! Owns the consistency invariant between the ledger (authoritative
//! fingerprints and stage history) and the metadata store (mutable
//! descriptive fields).
//!
//! ## Operations
//!
//! - `register`: fingerprint, anchor on the ledger, then insert into the
//!   store, bracketed by a pending-registration marker.
//! - `verify`: recompute the fingerprint from the store and compare it with
//!   the ledger's, byte for byte.
//! - `add_stage` / `get_history`: attributed, append-only lifecycle stages.
//! - `grant_admin` / `revoke_admin`: root-gated capability management.
//! - `reconcile`: settle markers left behind by interrupted registrations.
//!
//! ## Dependencies
//!
//! The engine is constructed from `Arc<dyn Ledger>`,
//! `Arc<dyn MetadataStore>`, `Arc<dyn PendingRegistrationStore>` and
//! `Arc<dyn Clock>`. It holds no global state and caches nothing.

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod reconcile;

pub use config::{ConfigError, EngineConfig, ReconcileConfig, ShelfLifePolicy};
pub use engine::{ReconciliationEngine, RegistrationReceipt, VerificationReport};
pub use error::EngineError;
pub use history::{history_view, HistoryEntry};
pub use reconcile::{ReconciledMarker, ReconciliationOutcome, ReconciliationReport};
