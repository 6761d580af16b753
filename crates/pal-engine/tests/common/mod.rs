//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pal_core::{Clock, Fingerprint, Identity, ManualClock, ProductId, Timestamp};
use pal_engine::{EngineConfig, ReconciliationEngine};
use pal_ledger::{
    Capability, InMemoryLedger, Ledger, LedgerError, LedgerEvent, LedgerEventKind,
    LedgerOperation, StageEvent,
};
use pal_store::{
    InMemoryMetadataStore, InMemoryPendingStore, MetadataStore, ProductRecord, StoreError,
};

pub const T0: &str = "2026-01-15T12:00:00Z";
pub const ASPIRIN_P1: &str = "0xebec2380eea1b932251572da361756bfd98896cbab69e5da3128b337341fe7be";
pub const IBUPROFEN_P1: &str =
    "0x159e0d471fa3ed6ffdc6aad28aa47baddd341b9b0c9af4f54bb657711efbda13";

pub fn id(s: &str) -> Identity {
    Identity::new(s).unwrap()
}

pub fn pid(s: &str) -> ProductId {
    ProductId::new(s).unwrap()
}

pub fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

/// Store whose inserts can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryMetadataStore,
    pub fail_inserts: AtomicBool,
}

impl MetadataStore for FlakyStore {
    fn insert(&self, record: &ProductRecord) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                operation: "insert",
                reason: "connection reset by peer".to_string(),
            });
        }
        self.inner.insert(record)
    }

    fn get(&self, product_id: &ProductId) -> Result<ProductRecord, StoreError> {
        self.inner.get(product_id)
    }

    fn store_name(&self) -> &str {
        "FlakyStore"
    }
}

/// Ledger whose registration transport can be cut.
pub struct FlakyLedger {
    pub inner: InMemoryLedger,
    pub unreachable: AtomicBool,
}

impl Ledger for FlakyLedger {
    fn register_product(
        &self,
        caller: &Identity,
        product_id: &ProductId,
        fingerprint: &Fingerprint,
    ) -> Result<LedgerEvent, LedgerError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable {
                operation: LedgerOperation::RegisterProduct,
                reason: "transaction submission timed out".to_string(),
            });
        }
        self.inner.register_product(caller, product_id, fingerprint)
    }

    fn append_stage(
        &self,
        caller: &Identity,
        product_id: &ProductId,
        stage_name: &str,
    ) -> Result<StageEvent, LedgerError> {
        self.inner.append_stage(caller, product_id, stage_name)
    }

    fn get_fingerprint(&self, product_id: &ProductId) -> Result<Fingerprint, LedgerError> {
        self.inner.get_fingerprint(product_id)
    }

    fn get_history(&self, product_id: &ProductId) -> Result<Vec<StageEvent>, LedgerError> {
        self.inner.get_history(product_id)
    }

    fn exists(&self, product_id: &ProductId) -> Result<bool, LedgerError> {
        self.inner.exists(product_id)
    }

    fn grant_administrative_capability(
        &self,
        caller: &Identity,
        identity: &Identity,
    ) -> Result<bool, LedgerError> {
        self.inner.grant_administrative_capability(caller, identity)
    }

    fn revoke_administrative_capability(
        &self,
        caller: &Identity,
        identity: &Identity,
    ) -> Result<bool, LedgerError> {
        self.inner.revoke_administrative_capability(caller, identity)
    }

    fn has_capability(
        &self,
        identity: &Identity,
        capability: Capability,
    ) -> Result<bool, LedgerError> {
        self.inner.has_capability(identity, capability)
    }

    fn events(&self) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.inner.events()
    }

    fn ledger_name(&self) -> &str {
        "FlakyLedger"
    }
}

pub struct Harness {
    pub engine: ReconciliationEngine,
    pub ledger: Arc<FlakyLedger>,
    pub store: Arc<FlakyStore>,
    pub pending: Arc<InMemoryPendingStore>,
    pub clock: Arc<ManualClock>,
    pub owner: Identity,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(ts(T0)));
        let owner = id("owner");
        let ledger = Arc::new(FlakyLedger {
            inner: InMemoryLedger::bootstrap(owner.clone(), clock.clone() as Arc<dyn Clock>)
                .unwrap(),
            unreachable: AtomicBool::new(false),
        });
        let store = Arc::new(FlakyStore::default());
        let pending = Arc::new(InMemoryPendingStore::new());
        let engine = ReconciliationEngine::new(
            ledger.clone(),
            store.clone(),
            pending.clone(),
            clock.clone(),
            config,
        );
        Self {
            engine,
            ledger,
            store,
            pending,
            clock,
            owner,
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: i64) {
        let now = self.clock.now();
        self.clock
            .set(Timestamp::from_epoch_secs(now.epoch_secs() + secs).unwrap());
    }

    /// Number of `ProductRegistered` events for `product_id`.
    pub fn registrations_of(&self, product_id: &str) -> usize {
        self.ledger
            .events()
            .unwrap()
            .iter()
            .filter(|e| {
                matches!(&e.kind, LedgerEventKind::ProductRegistered { product_id: p, .. }
                    if p.as_str() == product_id)
            })
            .count()
    }
}
