//! # Ledger Capability and In-Memory Ledger Model
//!
//! [`Ledger`] is the capability the reconciliation engine consumes. A
//! production deployment implements it over a transaction-submitting client;
//! [`InMemoryLedger`] reproduces the exact semantics any ledger-backed
//! implementation must provide and is what tests and the CLI run against.
//!
//! ## Per-product state machine
//!
//! ```text
//! Unregistered ──register_product──▶ Registered ──append_stage──▶ Registered
//! ```
//!
//! There is no update or delete. A registered fingerprint never changes.
//!
//! ## Order of checks on a mutating call
//!
//! 1. Authorization policy (`Unauthorized`).
//! 2. Argument validation (`InvalidArgument`).
//! 3. State preconditions (`AlreadyExists` / `NotFound`).
//! 4. Event prepared, committed to the log, applied to the views.
//!
//! Steps 1-3 run under the same lock as step 4, so concurrent registrations
//! of one product resolve to exactly one success and one `AlreadyExists`.
//! Any rejection leaves state untouched.
//!
//! ## Snapshots
//!
//! The event log is the only persisted state. Product and grant views are
//! rebuilt by replaying the log, which is first checked with
//! [`EventLog::verify_chain`] and then re-authorized event by event.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use pal_core::{Clock, Fingerprint, Identity, ProductId, Timestamp};

use crate::error::LedgerError;
use crate::event::{EventLog, LedgerEvent, LedgerEventKind, StageEvent};
use crate::policy::{AuthorizationPolicy, Capability, LedgerOperation, RoleGrants};

/// The ledger capability.
///
/// Implementations must be `Send + Sync` so they can be shared behind an
/// `Arc`. All calls are blocking; callers impose any timeout.
pub trait Ledger: Send + Sync {
    /// Anchor `fingerprint` for `product_id`. Requires the administrative
    /// capability.
    fn register_product(
        &self,
        caller: &Identity,
        product_id: &ProductId,
        fingerprint: &Fingerprint,
    ) -> Result<LedgerEvent, LedgerError>;

    /// Append a stage to a registered product's history. Requires the
    /// administrative capability. The timestamp is assigned by the ledger.
    fn append_stage(
        &self,
        caller: &Identity,
        product_id: &ProductId,
        stage_name: &str,
    ) -> Result<StageEvent, LedgerError>;

    /// The anchored fingerprint of a registered product.
    fn get_fingerprint(&self, product_id: &ProductId) -> Result<Fingerprint, LedgerError>;

    /// The product's stages in insertion order (empty if none yet).
    fn get_history(&self, product_id: &ProductId) -> Result<Vec<StageEvent>, LedgerError>;

    /// Whether the product is registered.
    ///
    /// Never fails for a reachable ledger; a transport failure surfaces as
    /// `Unavailable` rather than being folded into `false`.
    fn exists(&self, product_id: &ProductId) -> Result<bool, LedgerError>;

    /// Grant the administrative capability. Requires the root capability.
    /// Returns `false` if `identity` already held it.
    fn grant_administrative_capability(
        &self,
        caller: &Identity,
        identity: &Identity,
    ) -> Result<bool, LedgerError>;

    /// Revoke the administrative capability. Requires the root capability.
    /// Returns `false` if `identity` did not hold it.
    fn revoke_administrative_capability(
        &self,
        caller: &Identity,
        identity: &Identity,
    ) -> Result<bool, LedgerError>;

    /// Whether `identity` currently holds `capability`.
    fn has_capability(
        &self,
        identity: &Identity,
        capability: Capability,
    ) -> Result<bool, LedgerError>;

    /// The full event log in sequence order.
    fn events(&self) -> Result<Vec<LedgerEvent>, LedgerError>;

    /// Human-readable name of this implementation.
    fn ledger_name(&self) -> &str;
}

/// A registered product as the ledger sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProductEntry {
    fingerprint: Fingerprint,
    stages: Vec<StageEvent>,
}

/// State derived from the event log.
#[derive(Debug, Default)]
struct Views {
    products: BTreeMap<ProductId, ProductEntry>,
    grants: RoleGrants,
}

impl Views {
    fn check(&self, kind: &LedgerEventKind) -> Result<(), LedgerError> {
        match kind {
            LedgerEventKind::ProductRegistered { product_id, .. }
                if self.products.contains_key(product_id) =>
            {
                Err(LedgerError::AlreadyExists {
                    product_id: product_id.clone(),
                })
            }
            LedgerEventKind::StageAppended { product_id, .. }
                if !self.products.contains_key(product_id) =>
            {
                Err(LedgerError::NotFound {
                    product_id: product_id.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn apply(&mut self, event: &LedgerEvent) -> Option<StageEvent> {
        match &event.kind {
            LedgerEventKind::ProductRegistered {
                product_id,
                fingerprint,
            } => {
                self.products.insert(
                    product_id.clone(),
                    ProductEntry {
                        fingerprint: fingerprint.clone(),
                        stages: Vec::new(),
                    },
                );
                None
            }
            LedgerEventKind::StageAppended {
                product_id,
                stage_name,
            } => {
                let stage = StageEvent {
                    product_id: product_id.clone(),
                    sequence: event.sequence,
                    stage_name: stage_name.clone(),
                    authenticator: event.actor.clone(),
                    timestamp: event.timestamp,
                };
                let entry = self.products.get_mut(product_id)?;
                entry.stages.push(stage.clone());
                Some(stage)
            }
            LedgerEventKind::CapabilityGranted {
                identity,
                capability,
            } => {
                self.grants.insert(identity.clone(), *capability);
                None
            }
            LedgerEventKind::CapabilityRevoked {
                identity,
                capability,
            } => {
                self.grants.remove(identity, *capability);
                None
            }
        }
    }
}

fn operation_of(kind: &LedgerEventKind) -> LedgerOperation {
    match kind {
        LedgerEventKind::ProductRegistered { .. } => LedgerOperation::RegisterProduct,
        LedgerEventKind::StageAppended { .. } => LedgerOperation::AppendStage,
        LedgerEventKind::CapabilityGranted { .. } => LedgerOperation::GrantAdministrative,
        LedgerEventKind::CapabilityRevoked { .. } => LedgerOperation::RevokeAdministrative,
    }
}

/// Persistable form of an [`InMemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// The bootstrap (root) identity.
    pub root: Identity,
    /// The complete event log.
    pub log: EventLog,
}

struct Inner {
    root: Identity,
    views: Views,
    log: EventLog,
    last_timestamp: Option<Timestamp>,
}

impl Inner {
    /// Ledger time never runs backwards, even if the clock does.
    fn stamp(&self, clock: &dyn Clock) -> Timestamp {
        let now = clock.now();
        match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        }
    }

    fn append(
        &mut self,
        kind: LedgerEventKind,
        actor: &Identity,
        clock: &dyn Clock,
    ) -> Result<(LedgerEvent, Option<StageEvent>), LedgerError> {
        self.views.check(&kind)?;
        let timestamp = self.stamp(clock);
        let event = self.log.prepare(kind, actor, timestamp)?;
        self.log.commit(event.clone())?;
        self.last_timestamp = Some(timestamp);
        let stage = self.views.apply(&event);
        Ok((event, stage))
    }
}

/// In-process ledger with the full access-control and history semantics.
pub struct InMemoryLedger {
    inner: Mutex<Inner>,
    policy: AuthorizationPolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InMemoryLedger")
            .field("root", &inner.root)
            .field("products", &inner.views.products.len())
            .field("events", &inner.log.len())
            .finish()
    }
}

impl InMemoryLedger {
    /// Create a ledger whose deployer `root` holds both the root and the
    /// administrative capability.
    pub fn bootstrap(root: Identity, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let mut inner = Inner {
            root: root.clone(),
            views: Views::default(),
            log: EventLog::default(),
            last_timestamp: None,
        };
        for capability in [Capability::Root, Capability::Administrative] {
            inner.append(
                LedgerEventKind::CapabilityGranted {
                    identity: root.clone(),
                    capability,
                },
                &root,
                clock.as_ref(),
            )?;
        }
        tracing::info!(root = %root, "ledger bootstrapped");
        Ok(Self {
            inner: Mutex::new(inner),
            policy: AuthorizationPolicy,
            clock,
        })
    }

    /// Rebuild a ledger from a snapshot, verifying the chain and re-checking
    /// every event against the authorization policy.
    pub fn from_snapshot(
        snapshot: LedgerSnapshot,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        snapshot.log.verify_chain()?;
        let policy = AuthorizationPolicy;
        let mut views = Views::default();
        for (i, event) in snapshot.log.events().iter().enumerate() {
            let is_root_bootstrap = i == 0
                && event.actor == snapshot.root
                && event.kind
                    == LedgerEventKind::CapabilityGranted {
                        identity: snapshot.root.clone(),
                        capability: Capability::Root,
                    };
            if i == 0 && !is_root_bootstrap {
                return Err(LedgerError::Integrity(
                    "first event must be the root self-grant".to_string(),
                ));
            }
            if !is_root_bootstrap {
                policy
                    .authorize(operation_of(&event.kind), &event.actor, &views.grants)
                    .map_err(|e| {
                        LedgerError::Integrity(format!("event {}: {e}", event.sequence))
                    })?;
                views.check(&event.kind).map_err(|e| {
                    LedgerError::Integrity(format!("event {}: {e}", event.sequence))
                })?;
            }
            views.apply(event);
        }
        let last_timestamp = snapshot.log.events().last().map(|e| e.timestamp);
        Ok(Self {
            inner: Mutex::new(Inner {
                root: snapshot.root,
                views,
                log: snapshot.log,
                last_timestamp,
            }),
            policy,
            clock,
        })
    }

    /// Capture the persistable state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let inner = self.inner.lock();
        LedgerSnapshot {
            root: inner.root.clone(),
            log: inner.log.clone(),
        }
    }

    /// The bootstrap identity.
    pub fn root(&self) -> Identity {
        self.inner.lock().root.clone()
    }

    /// Check the event chain of the live ledger.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        self.inner.lock().log.verify_chain()
    }

    fn change_capability(
        &self,
        operation: LedgerOperation,
        caller: &Identity,
        identity: &Identity,
    ) -> Result<bool, LedgerError> {
        let mut inner = self.inner.lock();
        self.policy.authorize(operation, caller, &inner.views.grants)?;
        let held = inner
            .views
            .grants
            .holds(identity, Capability::Administrative);
        let kind = match operation {
            LedgerOperation::GrantAdministrative if !held => LedgerEventKind::CapabilityGranted {
                identity: identity.clone(),
                capability: Capability::Administrative,
            },
            LedgerOperation::RevokeAdministrative if held => LedgerEventKind::CapabilityRevoked {
                identity: identity.clone(),
                capability: Capability::Administrative,
            },
            _ => return Ok(false),
        };
        inner.append(kind, caller, self.clock.as_ref())?;
        tracing::info!(%caller, %identity, %operation, "administrative capability changed");
        Ok(true)
    }
}

impl Ledger for InMemoryLedger {
    fn register_product(
        &self,
        caller: &Identity,
        product_id: &ProductId,
        fingerprint: &Fingerprint,
    ) -> Result<LedgerEvent, LedgerError> {
        let mut inner = self.inner.lock();
        self.policy
            .authorize(LedgerOperation::RegisterProduct, caller, &inner.views.grants)?;
        let (event, _) = inner.append(
            LedgerEventKind::ProductRegistered {
                product_id: product_id.clone(),
                fingerprint: fingerprint.clone(),
            },
            caller,
            self.clock.as_ref(),
        )?;
        tracing::info!(
            product_id = %product_id,
            fingerprint = %fingerprint,
            sequence = event.sequence,
            "product registered on ledger"
        );
        Ok(event)
    }

    fn append_stage(
        &self,
        caller: &Identity,
        product_id: &ProductId,
        stage_name: &str,
    ) -> Result<StageEvent, LedgerError> {
        let mut inner = self.inner.lock();
        self.policy
            .authorize(LedgerOperation::AppendStage, caller, &inner.views.grants)?;
        if stage_name.trim().is_empty() {
            return Err(LedgerError::InvalidArgument {
                operation: LedgerOperation::AppendStage,
                reason: "stage_name must not be empty".to_string(),
            });
        }
        let (event, stage) = inner.append(
            LedgerEventKind::StageAppended {
                product_id: product_id.clone(),
                stage_name: stage_name.to_string(),
            },
            caller,
            self.clock.as_ref(),
        )?;
        let stage = stage.ok_or_else(|| {
            LedgerError::Integrity(format!(
                "stage event {} was not applied to {product_id}",
                event.sequence
            ))
        })?;
        tracing::info!(
            product_id = %product_id,
            stage = stage_name,
            sequence = stage.sequence,
            "stage appended"
        );
        Ok(stage)
    }

    fn get_fingerprint(&self, product_id: &ProductId) -> Result<Fingerprint, LedgerError> {
        let inner = self.inner.lock();
        inner
            .views
            .products
            .get(product_id)
            .map(|p| p.fingerprint.clone())
            .ok_or_else(|| LedgerError::NotFound {
                product_id: product_id.clone(),
            })
    }

    fn get_history(&self, product_id: &ProductId) -> Result<Vec<StageEvent>, LedgerError> {
        let inner = self.inner.lock();
        inner
            .views
            .products
            .get(product_id)
            .map(|p| p.stages.clone())
            .ok_or_else(|| LedgerError::NotFound {
                product_id: product_id.clone(),
            })
    }

    fn exists(&self, product_id: &ProductId) -> Result<bool, LedgerError> {
        Ok(self.inner.lock().views.products.contains_key(product_id))
    }

    fn grant_administrative_capability(
        &self,
        caller: &Identity,
        identity: &Identity,
    ) -> Result<bool, LedgerError> {
        self.change_capability(LedgerOperation::GrantAdministrative, caller, identity)
    }

    fn revoke_administrative_capability(
        &self,
        caller: &Identity,
        identity: &Identity,
    ) -> Result<bool, LedgerError> {
        self.change_capability(LedgerOperation::RevokeAdministrative, caller, identity)
    }

    fn has_capability(
        &self,
        identity: &Identity,
        capability: Capability,
    ) -> Result<bool, LedgerError> {
        Ok(self.inner.lock().views.grants.holds(identity, capability))
    }

    fn events(&self) -> Result<Vec<LedgerEvent>, LedgerError> {
        Ok(self.inner.lock().log.events().to_vec())
    }

    fn ledger_name(&self) -> &str {
        "InMemoryLedger"
    }
}
