//! # Subcommands
//!
//! Each subcommand is a thin pass-through to the reconciliation engine.
//! Handlers return a process exit code: `0` on success, `2` when the
//! command ran but found a problem (an inauthentic product, an unresolved
//! reconciliation sweep). Any error maps to `1` in `main`.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use pal_core::Identity;
use pal_engine::{ReconciliationEngine, ReconciliationOutcome};

/// Product Authenticity Ledger subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a product: anchor its fingerprint on the ledger and store
    /// its descriptive record.
    RegisterProduct {
        product_id: String,
        product_type: String,
        batch_number: String,
    },

    /// Recompute a product's fingerprint from the store and compare it with
    /// the ledger.
    VerifyProduct { product_id: String },

    /// Append a lifecycle stage to a registered product.
    AddStage {
        product_id: String,
        stage_name: String,
    },

    /// Show a product's stage history in ledger order.
    GetHistory { product_id: String },

    /// Grant the administrative capability (root only).
    GrantAdmin { identity: String },

    /// Revoke the administrative capability (root only).
    RevokeAdmin { identity: String },

    /// Settle pending registrations left by interrupted runs.
    Reconcile,
}

impl Command {
    /// Whether the command writes to the ledger and so needs a caller.
    pub fn needs_caller(&self) -> bool {
        !matches!(
            self,
            Self::VerifyProduct { .. } | Self::GetHistory { .. } | Self::Reconcile
        )
    }
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human();
    }
    Ok(())
}

/// Run one subcommand.
pub fn run_command(
    command: &Command,
    engine: &ReconciliationEngine,
    caller: Option<&Identity>,
    json: bool,
) -> Result<u8> {
    let require_caller = || caller.context("this command needs --as <identity> or PAL_IDENTITY");

    match command {
        Command::RegisterProduct {
            product_id,
            product_type,
            batch_number,
        } => {
            let receipt = engine
                .register(require_caller()?, product_id, product_type, batch_number)
                .with_context(|| format!("register-product {product_id} failed"))?;
            emit(json, &receipt, || {
                println!("OK: registered {}", receipt.product_id);
                println!("  Fingerprint: {}", receipt.fingerprint);
                println!("  Manufactured: {}", receipt.manufactured_at);
                println!("  Expires: {}", receipt.expires_at);
            })?;
            Ok(0)
        }

        Command::VerifyProduct { product_id } => {
            let report = engine
                .verify(product_id)
                .with_context(|| format!("verify-product {product_id} failed"))?;
            emit(json, &report, || {
                let verdict = if report.is_authentic {
                    "AUTHENTIC"
                } else {
                    "NOT AUTHENTIC"
                };
                println!("{verdict}: {}", report.product_id);
                println!("  Store fingerprint:  {}", report.store_fingerprint);
                println!("  Ledger fingerprint: {}", report.ledger_fingerprint);
                println!("  Type: {}", report.record.product_type);
                println!("  Batch: {}", report.record.batch_number);
                println!("  Manufactured: {}", report.record.manufactured_at);
                println!("  Expires: {}", report.record.expires_at);
            })?;
            Ok(if report.is_authentic { 0 } else { 2 })
        }

        Command::AddStage {
            product_id,
            stage_name,
        } => {
            let entry = engine
                .add_stage(require_caller()?, product_id, stage_name)
                .with_context(|| format!("add-stage {product_id} failed"))?;
            emit(json, &entry, || {
                println!(
                    "OK: stage {:?} recorded for {product_id} by {} at {}",
                    entry.stage_name, entry.authenticator, entry.recorded_at
                );
            })?;
            Ok(0)
        }

        Command::GetHistory { product_id } => {
            let history = engine
                .get_history(product_id)
                .with_context(|| format!("get-history {product_id} failed"))?;
            emit(json, &history, || {
                if history.is_empty() {
                    println!("No stages recorded for {product_id}.");
                }
                for entry in &history {
                    println!(
                        "#{:<4} {}  {:<20} {}",
                        entry.sequence, entry.recorded_at, entry.stage_name, entry.authenticator
                    );
                }
            })?;
            Ok(0)
        }

        Command::GrantAdmin { identity } => {
            let changed = engine
                .grant_admin(require_caller()?, identity)
                .with_context(|| format!("grant-admin {identity} failed"))?;
            emit(json, &serde_json::json!({ "identity": identity, "changed": changed }), || {
                if changed {
                    println!("OK: {identity} is now an administrator");
                } else {
                    println!("OK: {identity} was already an administrator");
                }
            })?;
            Ok(0)
        }

        Command::RevokeAdmin { identity } => {
            let changed = engine
                .revoke_admin(require_caller()?, identity)
                .with_context(|| format!("revoke-admin {identity} failed"))?;
            emit(json, &serde_json::json!({ "identity": identity, "changed": changed }), || {
                if changed {
                    println!("OK: {identity} is no longer an administrator");
                } else {
                    println!("OK: {identity} was not an administrator");
                }
            })?;
            Ok(0)
        }

        Command::Reconcile => {
            let report = engine.reconcile().context("reconciliation sweep failed")?;
            emit(json, &report, || {
                if report.markers.is_empty() {
                    println!("No pending registrations.");
                }
                for m in &report.markers {
                    let detail = match &m.outcome {
                        ReconciliationOutcome::Abandoned => "abandoned".to_string(),
                        ReconciliationOutcome::Replayed => "replayed store insert".to_string(),
                        ReconciliationOutcome::AlreadyConsistent => "consistent".to_string(),
                        ReconciliationOutcome::InFlight => "in flight, skipped".to_string(),
                        ReconciliationOutcome::Flagged { ledger_fingerprint } => {
                            format!("FLAGGED: ledger holds {ledger_fingerprint}")
                        }
                        ReconciliationOutcome::Failed { error } => format!("FAILED: {error}"),
                    };
                    println!("{}  {}  {detail}", m.product_id, m.fingerprint);
                }
            })?;
            Ok(if report.is_clean() { 0 } else { 2 })
        }
    }
}
