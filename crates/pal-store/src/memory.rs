//! In-memory store backends.
//!
//! Used by tests and by the CLI's file-backed mode, which loads a snapshot
//! with [`InMemoryMetadataStore::from_records`] and writes
//! [`InMemoryMetadataStore::records`] back after each command.

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};

use pal_core::ProductId;

use crate::error::StoreError;
use crate::record::{PendingRegistration, ProductRecord};
use crate::store::{MetadataStore, PendingRegistrationStore};

const PRODUCTS: &str = "products";
const PENDING: &str = "pending_registrations";

/// Product records held in a map keyed by product id.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<BTreeMap<ProductId, ProductRecord>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records, rejecting duplicate product ids.
    pub fn from_records(
        records: impl IntoIterator<Item = ProductRecord>,
    ) -> Result<Self, StoreError> {
        let store = Self::new();
        for record in records {
            store.insert(&record)?;
        }
        Ok(store)
    }

    /// All records, ordered by product id.
    pub fn records(&self) -> Vec<ProductRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Replace a record outside the [`MetadataStore`] contract.
    ///
    /// Models an out-of-band edit to the descriptive store (a manual
    /// correction, or tampering). Nothing in the engine calls this.
    pub fn overwrite_unchecked(&self, record: ProductRecord) {
        tracing::warn!(product_id = %record.product_id, "product record overwritten out of band");
        self.records
            .write()
            .insert(record.product_id.clone(), record);
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn insert(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if records.contains_key(&record.product_id) {
            return Err(StoreError::Conflict {
                table: PRODUCTS,
                product_id: record.product_id.clone(),
            });
        }
        records.insert(record.product_id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, product_id: &ProductId) -> Result<ProductRecord, StoreError> {
        self.records
            .read()
            .get(product_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                table: PRODUCTS,
                product_id: product_id.clone(),
            })
    }

    fn store_name(&self) -> &str {
        "InMemoryMetadataStore"
    }
}

/// Saga markers held in a map keyed by product id.
#[derive(Debug, Default)]
pub struct InMemoryPendingStore {
    markers: Mutex<BTreeMap<ProductId, PendingRegistration>>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load markers, rejecting duplicate product ids.
    pub fn from_markers(
        markers: impl IntoIterator<Item = PendingRegistration>,
    ) -> Result<Self, StoreError> {
        let store = Self::new();
        for marker in markers {
            store.put_pending(&marker)?;
        }
        Ok(store)
    }
}

impl PendingRegistrationStore for InMemoryPendingStore {
    fn put_pending(&self, marker: &PendingRegistration) -> Result<(), StoreError> {
        let mut markers = self.markers.lock();
        if markers.contains_key(&marker.product_id) {
            return Err(StoreError::Conflict {
                table: PENDING,
                product_id: marker.product_id.clone(),
            });
        }
        markers.insert(marker.product_id.clone(), marker.clone());
        Ok(())
    }

    fn clear_pending(&self, product_id: &ProductId) -> Result<bool, StoreError> {
        Ok(self.markers.lock().remove(product_id).is_some())
    }

    fn list_pending(&self) -> Result<Vec<PendingRegistration>, StoreError> {
        Ok(self.markers.lock().values().cloned().collect())
    }
}
