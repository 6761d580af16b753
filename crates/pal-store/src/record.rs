//! Product records and pending-registration markers.

use serde::{Deserialize, Serialize};

use pal_core::{BatchNumber, Fingerprint, ProductFields, ProductId, Timestamp};

/// The descriptive copy of a product identity record.
///
/// The store does not check that `fingerprint` matches the other fields.
/// Divergence between the two is exactly what verification detects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Primary key.
    pub product_id: ProductId,
    /// Product type, e.g. `Aspirin`.
    pub product_type: String,
    /// Manufacturing batch.
    pub batch_number: BatchNumber,
    /// Registration instant.
    pub manufactured_at: Timestamp,
    /// `manufactured_at` plus the shelf life for the product type.
    pub expires_at: Timestamp,
    /// Fingerprint computed at registration time.
    pub fingerprint: Fingerprint,
}

impl ProductRecord {
    /// The fingerprinted fields in their fixed order.
    pub fn fields(&self) -> ProductFields<'_> {
        ProductFields {
            product_id: self.product_id.as_str(),
            product_type: &self.product_type,
            batch_number: self.batch_number.as_str(),
            manufactured_at: self.manufactured_at,
            expires_at: self.expires_at,
        }
    }
}

/// Saga marker for a registration whose store write has not yet committed.
///
/// Written before the ledger call and cleared once the store insert
/// succeeds. A marker that outlives its registration is picked up by the
/// reconciliation sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRegistration {
    /// Product being registered. At most one marker exists per product.
    pub product_id: ProductId,
    /// Fingerprint the registration anchors on the ledger.
    pub fingerprint: Fingerprint,
    /// The record the store insert will write.
    pub record: ProductRecord,
    /// When the marker was written.
    pub created_at: Timestamp,
}

impl PendingRegistration {
    /// Marker for `record`, keyed and fingerprinted from it.
    pub fn new(record: ProductRecord, created_at: Timestamp) -> Self {
        Self {
            product_id: record.product_id.clone(),
            fingerprint: record.fingerprint.clone(),
            record,
            created_at,
        }
    }
}
