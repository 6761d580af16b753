//! Ledger error types.

use thiserror::Error;

use pal_core::{ErrorKind, Identity, ProductId};

use crate::policy::{Capability, LedgerOperation};

/// Errors returned by a [`crate::Ledger`] implementation.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Caller lacks the capability the operation requires.
    #[error("{caller} is not authorized to {operation}: requires {required} capability")]
    Unauthorized {
        /// The rejected caller.
        caller: Identity,
        /// The attempted operation.
        operation: LedgerOperation,
        /// The capability that was missing.
        required: Capability,
    },

    /// The product is already registered.
    #[error("product {product_id} is already registered")]
    AlreadyExists {
        /// The duplicate product identifier.
        product_id: ProductId,
    },

    /// The product is not registered.
    #[error("product {product_id} is not registered")]
    NotFound {
        /// The missing product identifier.
        product_id: ProductId,
    },

    /// An argument was empty or malformed.
    #[error("invalid argument to {operation}: {reason}")]
    InvalidArgument {
        /// The attempted operation.
        operation: LedgerOperation,
        /// Why it was rejected.
        reason: String,
    },

    /// The ledger could not be reached.
    #[error("ledger unavailable during {operation}: {reason}")]
    Unavailable {
        /// The attempted operation.
        operation: LedgerOperation,
        /// Transport-level cause.
        reason: String,
    },

    /// The ledger's own data failed an integrity check.
    #[error("ledger integrity violation: {0}")]
    Integrity(String),
}

impl LedgerError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::Integrity(_) => ErrorKind::Integrity,
        }
    }
}
