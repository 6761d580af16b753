//! Engine error types.
//!
//! Boundary failures are wrapped unchanged; callers classify any error with
//! [`EngineError::kind`] rather than by inspecting messages.

use thiserror::Error;

use pal_core::{ErrorKind, Fingerprint, ProductId, ValidationError};
use pal_ledger::LedgerError;
use pal_store::StoreError;

/// Errors returned by [`crate::ReconciliationEngine`].
#[derive(Error, Debug)]
pub enum EngineError {
    /// An input was empty or malformed. Raised before any boundary call.
    #[error("invalid argument to {operation}: {reason}")]
    InvalidArgument {
        /// Engine operation that rejected the input.
        operation: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The ledger already holds this product.
    #[error("product {product_id} is already registered")]
    AlreadyExists {
        /// The duplicate product.
        product_id: ProductId,
    },

    /// A marker older than the in-flight window is still present for this
    /// product: an earlier registration was interrupted and awaits the
    /// reconciliation sweep. A marker inside the window is reported as
    /// `AlreadyExists` instead.
    #[error("registration of {product_id} is pending; run the reconciliation sweep")]
    RegistrationPending {
        /// Product whose marker blocks the registration.
        product_id: ProductId,
    },

    /// The ledger write committed but the store write did not.
    ///
    /// The pending marker is left in place for the reconciliation sweep.
    #[error(
        "partial commit for {product_id}: anchored on ledger as {ledger_fingerprint} \
         but the store insert failed: {source}"
    )]
    PartialCommit {
        /// Product now on the ledger but missing from the store.
        product_id: ProductId,
        /// Fingerprint the ledger holds for it.
        ledger_fingerprint: Fingerprint,
        /// Why the store insert failed.
        #[source]
        source: StoreError,
    },

    /// A ledger call failed; the ledger's error is passed through unchanged.
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    /// A store call failed; the store's error is passed through unchanged.
    #[error("metadata store: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::RegistrationPending { .. } => ErrorKind::Conflict,
            Self::PartialCommit { .. } => ErrorKind::PartialCommit,
            Self::Ledger(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }

    pub(crate) fn invalid(operation: &'static str, err: ValidationError) -> Self {
        Self::InvalidArgument {
            operation,
            reason: err.to_string(),
        }
    }
}
