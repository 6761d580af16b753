//! # Error Types — Shared Taxonomy
//!
//! Every boundary error in the workspace classifies itself into one
//! [`ErrorKind`]. Callers branch on the kind, never on message text.
//!
//! ## Design
//!
//! - `InvalidArgument` is raised locally before any boundary call and is
//!   never retried automatically.
//! - `PartialCommit` means the ledger accepted a write the metadata store
//!   did not; it always carries enough context to drive reconciliation.
//! - `Unavailable` is propagated, never masked as success.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification shared by ledger, store, and engine errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input.
    InvalidArgument,
    /// Capability check failed.
    Unauthorized,
    /// Referenced entity is absent.
    NotFound,
    /// Ledger-side uniqueness violation.
    AlreadyExists,
    /// Store-side uniqueness violation.
    Conflict,
    /// Ledger committed, store write failed.
    PartialCommit,
    /// Boundary capability unreachable.
    Unavailable,
    /// Stored data failed an integrity check.
    Integrity,
}

impl ErrorKind {
    /// Machine-readable code (e.g. `NOT_FOUND`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Conflict => "CONFLICT",
            Self::PartialCommit => "PARTIAL_COMMIT",
            Self::Unavailable => "UNAVAILABLE",
            Self::Integrity => "INTEGRITY",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input failed validation at a constructor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field was empty (after trimming).
    #[error("{field} must not be empty")]
    Empty {
        /// Field name.
        field: &'static str,
    },

    /// Field exceeded its maximum length.
    #[error("{field} must be at most {max} characters, got {actual}")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
        /// Observed length.
        actual: usize,
    },

    /// Field contained a forbidden character.
    #[error("{field} contains a forbidden character: {found:?}")]
    ForbiddenCharacter {
        /// Field name.
        field: &'static str,
        /// The offending character.
        found: char,
    },

    /// Field did not match its expected format.
    #[error("{field} is malformed: {reason}")]
    Malformed {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ValidationError {
    /// Always [`ErrorKind::InvalidArgument`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

/// Error during JCS canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
