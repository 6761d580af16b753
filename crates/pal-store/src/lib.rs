//! # pal-store — Metadata Store Capability
//!
//! The metadata store holds the mutable, descriptive copy of each product
//! identity record. The ledger holds the authoritative fingerprint; the two
//! are expected to agree, and verification reports when they do not.
//!
//! ## Backends
//!
//! - `InMemoryMetadataStore` / `InMemoryPendingStore`: map-backed, used by
//!   tests and the CLI's file-backed mode.
//! - `PgMetadataStore`: PostgreSQL via SQLx, selected when `DATABASE_URL` is
//!   set. Schema lives in `migrations/`.
//!
//! Neither backend caches reads.

pub mod error;
pub mod memory;
pub mod pg;
pub mod record;
pub mod store;

pub use error::StoreError;
pub use memory::{InMemoryMetadataStore, InMemoryPendingStore};
pub use pg::PgMetadataStore;
pub use record::{PendingRegistration, ProductRecord};
pub use store::{MetadataStore, PendingRegistrationStore};
