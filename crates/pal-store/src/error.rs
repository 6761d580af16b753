//! Metadata store error types.

use thiserror::Error;

use pal_core::{ErrorKind, ProductId};

/// Errors returned by a [`crate::MetadataStore`] or
/// [`crate::PendingRegistrationStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// A row with this primary key already exists.
    #[error("{table} already holds a row for product {product_id}")]
    Conflict {
        /// Table that rejected the insert.
        table: &'static str,
        /// Duplicate key.
        product_id: ProductId,
    },

    /// No row with this primary key.
    #[error("{table} has no row for product {product_id}")]
    NotFound {
        /// Table that was queried.
        table: &'static str,
        /// Missing key.
        product_id: ProductId,
    },

    /// The backing store could not be reached.
    #[error("metadata store unavailable during {operation}: {reason}")]
    Unavailable {
        /// Store operation that failed.
        operation: &'static str,
        /// Driver error text.
        reason: String,
    },

    /// A stored row could not be decoded into a valid record.
    #[error("stored row for {product_id} is corrupt: {reason}")]
    Corrupt {
        /// Raw key of the row, which may itself be invalid.
        product_id: String,
        /// Why decoding failed.
        reason: String,
    },
}

impl StoreError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::Corrupt { .. } => ErrorKind::Integrity,
        }
    }
}
