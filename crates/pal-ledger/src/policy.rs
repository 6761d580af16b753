//! # Authorization Policy
//!
//! One policy object decides every ledger call. Each [`LedgerOperation`]
//! maps to exactly one [`Requirement`]:
//!
//! | Operation                  | Requirement                |
//! |----------------------------|----------------------------|
//! | `RegisterProduct`          | `AdministrativeCapability` |
//! | `AppendStage`              | `AdministrativeCapability` |
//! | `GrantAdministrative`      | `RootCapability`           |
//! | `RevokeAdministrative`     | `RootCapability`           |
//! | every read                 | `Public`                   |
//!
//! The table is an exhaustive `match`, so adding an operation forces a
//! decision about who may invoke it. The ledger evaluates the policy before
//! touching state; a rejected call leaves the ledger unchanged.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use pal_core::Identity;

use crate::error::LedgerError;

/// A capability tag held by an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Owner capability: may grant and revoke `Administrative`.
    Root,
    /// May register products and append stages.
    Administrative,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => f.write_str("ROOT"),
            Self::Administrative => f.write_str("ADMINISTRATIVE"),
        }
    }
}

/// Every operation the ledger exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOperation {
    /// Anchor a product fingerprint.
    RegisterProduct,
    /// Append a lifecycle stage.
    AppendStage,
    /// Read a product's fingerprint.
    GetFingerprint,
    /// Read a product's stages.
    GetHistory,
    /// Check whether a product is registered.
    Exists,
    /// Grant the administrative capability.
    GrantAdministrative,
    /// Revoke the administrative capability.
    RevokeAdministrative,
    /// Query an identity's capabilities.
    HasCapability,
    /// Read the raw event log.
    ReadEvents,
}

impl std::fmt::Display for LedgerOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RegisterProduct => "register_product",
            Self::AppendStage => "append_stage",
            Self::GetFingerprint => "get_fingerprint",
            Self::GetHistory => "get_history",
            Self::Exists => "exists",
            Self::GrantAdministrative => "grant_administrative",
            Self::RevokeAdministrative => "revoke_administrative",
            Self::HasCapability => "has_capability",
            Self::ReadEvents => "read_events",
        };
        f.write_str(s)
    }
}

/// What a caller must hold to invoke an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Requirement {
    /// Caller must hold [`Capability::Root`].
    RootCapability,
    /// Caller must hold [`Capability::Administrative`].
    AdministrativeCapability,
    /// Anyone may invoke.
    Public,
}

impl Requirement {
    /// The capability this requirement demands, if any.
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Self::RootCapability => Some(Capability::Root),
            Self::AdministrativeCapability => Some(Capability::Administrative),
            Self::Public => None,
        }
    }
}

/// The set of role grants currently in force.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrants {
    grants: BTreeMap<Identity, BTreeSet<Capability>>,
}

impl RoleGrants {
    /// Whether `identity` holds `capability`.
    pub fn holds(&self, identity: &Identity, capability: Capability) -> bool {
        self.grants
            .get(identity)
            .is_some_and(|caps| caps.contains(&capability))
    }

    /// Add a grant. Returns `false` if it was already held.
    pub fn insert(&mut self, identity: Identity, capability: Capability) -> bool {
        self.grants.entry(identity).or_default().insert(capability)
    }

    /// Remove a grant. Returns `false` if it was not held.
    pub fn remove(&mut self, identity: &Identity, capability: Capability) -> bool {
        let Some(caps) = self.grants.get_mut(identity) else {
            return false;
        };
        let removed = caps.remove(&capability);
        if caps.is_empty() {
            self.grants.remove(identity);
        }
        removed
    }
}

/// The ledger's authorization policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    /// The requirement attached to an operation.
    pub fn requirement(&self, operation: LedgerOperation) -> Requirement {
        match operation {
            LedgerOperation::RegisterProduct | LedgerOperation::AppendStage => {
                Requirement::AdministrativeCapability
            }
            LedgerOperation::GrantAdministrative | LedgerOperation::RevokeAdministrative => {
                Requirement::RootCapability
            }
            LedgerOperation::GetFingerprint
            | LedgerOperation::GetHistory
            | LedgerOperation::Exists
            | LedgerOperation::HasCapability
            | LedgerOperation::ReadEvents => Requirement::Public,
        }
    }

    /// Decide whether `caller` may perform `operation` under `grants`.
    pub fn authorize(
        &self,
        operation: LedgerOperation,
        caller: &Identity,
        grants: &RoleGrants,
    ) -> Result<(), LedgerError> {
        match self.requirement(operation).capability() {
            None => Ok(()),
            Some(required) if grants.holds(caller, required) => Ok(()),
            Some(required) => Err(LedgerError::Unauthorized {
                caller: caller.clone(),
                operation,
                required,
            }),
        }
    }
}
