//! # pal-ledger — Role-Gated, Append-Only Ledger Model
//!
//! Models the authoritative side of the Product Authenticity Ledger: the
//! anchored product fingerprints and their attributed stage histories.
//!
//! ## Components
//!
//! - **Policy** (`policy.rs`): the single `AuthorizationPolicy` consulted
//!   before every ledger call. Each `LedgerOperation` maps to exactly one
//!   `Requirement` (`RootCapability`, `AdministrativeCapability`, `Public`).
//!
//! - **Events** (`event.rs`): `LedgerEvent` records every accepted mutation
//!   with a sequence number, actor and timestamp, chained by SHA-256 digest.
//!
//! - **Ledger** (`ledger.rs`): the `Ledger` capability trait the
//!   reconciliation engine consumes, and `InMemoryLedger`, the reference
//!   model any ledger-backed implementation must match.
//!
//! ## Guarantees
//!
//! A registered fingerprint never changes. Stages are only ever appended.
//! Rejected calls leave state unchanged. Concurrent registrations of the same
//! product resolve to exactly one winner.

pub mod error;
pub mod event;
pub mod ledger;
pub mod policy;

pub use error::LedgerError;
pub use event::{EventLog, LedgerEvent, LedgerEventKind, StageEvent, GENESIS_DIGEST};
pub use ledger::{InMemoryLedger, Ledger, LedgerSnapshot};
pub use policy::{AuthorizationPolicy, Capability, LedgerOperation, Requirement, RoleGrants};
