#![deny(missing_docs)]

//! # pal-core — Foundational Types for the Product Authenticity Ledger
//!
//! Leaf crate of the PAL workspace. Every other crate depends on `pal-core`;
//! it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `ProductId`, `BatchNumber`,
//!    `Identity` — validated constructors, no bare strings at the boundaries.
//!
//! 2. **`CanonicalBytes` newtype.** All digest computation flows through
//!    `CanonicalBytes`. The product fingerprint uses the type-tagged,
//!    length-prefixed field encoding (`CanonicalBytes::from_fields`); structured
//!    payloads use JCS (`CanonicalBytes::new`).
//!
//! 3. **UTC-only timestamps.** `Timestamp` is UTC with seconds precision and
//!    renders as `YYYY-MM-DDTHH:MM:SSZ`, the exact form the fingerprint hashes.
//!
//! 4. **Injected time.** Nothing reads the wall clock directly; the `Clock`
//!    trait is passed in so tests can pin time.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pal-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod clock;
pub mod digest;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::{CanonicalBytes, CanonicalField};
pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use digest::{sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{ErrorKind, ValidationError};
pub use fingerprint::{fingerprint, Fingerprint, ProductFields};
pub use identity::{BatchNumber, Identity, ProductId};
pub use temporal::Timestamp;
