//! # Store Capabilities
//!
//! The reconciliation engine consumes two narrow capabilities rather than a
//! concrete client, so tests substitute in-memory fakes for both.
//!
//! - [`MetadataStore`]: keyed insert and keyed get over product records.
//!   No update or delete. Reads always return the latest committed write;
//!   implementations must not cache.
//! - [`PendingRegistrationStore`]: saga markers for registrations whose
//!   store write has not yet committed.
//!
//! All calls are blocking. Callers impose any timeout.

use pal_core::ProductId;

use crate::error::StoreError;
use crate::record::{PendingRegistration, ProductRecord};

/// Keyed access to descriptive product records.
pub trait MetadataStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::Conflict`] if the
    /// product id is already present.
    fn insert(&self, record: &ProductRecord) -> Result<(), StoreError>;

    /// Fetch a record. Fails with [`StoreError::NotFound`] if absent.
    fn get(&self, product_id: &ProductId) -> Result<ProductRecord, StoreError>;

    /// Human-readable name of this backend.
    fn store_name(&self) -> &str;
}

/// Saga markers for in-flight registrations.
pub trait PendingRegistrationStore: Send + Sync {
    /// Record a marker. Fails with [`StoreError::Conflict`] if a marker for
    /// the same product is already present.
    fn put_pending(&self, marker: &PendingRegistration) -> Result<(), StoreError>;

    /// Remove the marker for `product_id`. Returns `false` if there was none.
    fn clear_pending(&self, product_id: &ProductId) -> Result<bool, StoreError>;

    /// All markers, ordered by product id.
    fn list_pending(&self) -> Result<Vec<PendingRegistration>, StoreError>;
}
