//! # pal-cli — Command-Line Interface for the Product Authenticity Ledger
//!
//! Provides the `pal` binary:
//!
//! ```bash
//! pal --as deployer register-product P1 Aspirin B001
//! pal verify-product P1
//! pal --as deployer grant-admin packer
//! pal --as packer add-stage P1 Packaged
//! pal get-history P1
//! pal reconcile
//! ```
//!
//! State lives in a local directory (see [`state`]). Setting `DATABASE_URL`
//! moves product records and pending markers into PostgreSQL; the ledger
//! snapshot always stays in the state directory.

pub mod commands;
pub mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};

use pal_core::Identity;
use pal_engine::EngineConfig;

use crate::commands::{run_command, Command};
use crate::state::Workspace;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub state_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub identity: Option<String>,
    pub database_url: Option<String>,
    pub json: bool,
}

/// Load configuration and state, run `command`, and write state back.
pub fn run(opts: &RunOptions, command: &Command) -> Result<u8> {
    let caller = opts
        .identity
        .as_deref()
        .map(Identity::new)
        .transpose()
        .context("invalid --as identity")?;
    if command.needs_caller() && caller.is_none() {
        anyhow::bail!("this command needs --as <identity> or PAL_IDENTITY");
    }

    let config = match &opts.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let workspace = Workspace::open(
        &opts.state_dir,
        caller.as_ref(),
        opts.database_url.as_deref(),
    )?;
    let engine = workspace.engine(config);
    let result = run_command(command, &engine, caller.as_ref(), opts.json);
    finish(result, workspace.save())
}

/// Combine a command's outcome with the result of saving state.
///
/// A command error always wins; a failed save is attached to it as context.
fn finish(result: Result<u8>, saved: Result<()>) -> Result<u8> {
    match (result, saved) {
        (result, Ok(())) => result,
        (Ok(_), Err(save)) => Err(save),
        (Err(e), Err(save)) => Err(e.context(format!("state could not be saved: {save:#}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pal_ledger::Ledger;
    use pal_store::MetadataStore;

    fn opts(dir: &std::path::Path, identity: Option<&str>) -> RunOptions {
        RunOptions {
            state_dir: dir.to_path_buf(),
            identity: identity.map(str::to_string),
            ..RunOptions::default()
        }
    }

    fn register(product_id: &str) -> Command {
        Command::RegisterProduct {
            product_id: product_id.to_string(),
            product_type: "Aspirin".to_string(),
            batch_number: "B001".to_string(),
        }
    }

    #[test]
    fn register_verify_and_history_across_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let owner = opts(dir.path(), Some("deployer"));
        let anyone = opts(dir.path(), None);

        assert_eq!(run(&owner, &register("P1")).unwrap(), 0);
        assert_eq!(
            run(
                &anyone,
                &Command::VerifyProduct {
                    product_id: "P1".to_string()
                }
            )
            .unwrap(),
            0
        );
        for stage in ["Packaged", "Shipped"] {
            let cmd = Command::AddStage {
                product_id: "P1".to_string(),
                stage_name: stage.to_string(),
            };
            assert_eq!(run(&owner, &cmd).unwrap(), 0);
        }
        let history = Command::GetHistory {
            product_id: "P1".to_string(),
        };
        assert_eq!(run(&anyone, &history).unwrap(), 0);
    }

    #[test]
    fn duplicate_register_fails() {
        let dir = tempfile::tempdir().unwrap();
        let owner = opts(dir.path(), Some("deployer"));
        run(&owner, &register("P1")).unwrap();
        let err = run(&owner, &register("P1")).unwrap_err();
        assert!(format!("{err:#}").contains("already registered"));
    }

    #[test]
    fn mutating_command_without_identity_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&opts(dir.path(), None), &register("P1")).is_err());
    }

    #[test]
    fn non_admin_cannot_register() {
        let dir = tempfile::tempdir().unwrap();
        run(&opts(dir.path(), Some("deployer")), &register("P1")).unwrap();
        let err = run(&opts(dir.path(), Some("stranger")), &register("P2")).unwrap_err();
        assert!(format!("{err:#}").contains("not authorized"));
    }

    #[test]
    fn tampered_store_file_verifies_not_authentic() {
        let dir = tempfile::tempdir().unwrap();
        run(&opts(dir.path(), Some("deployer")), &register("P1")).unwrap();

        let ws = Workspace::open(dir.path(), None, None).unwrap();
        let store = ws.file_store().unwrap();
        let mut record = store.get(&pal_core::ProductId::new("P1").unwrap()).unwrap();
        record.product_type = "Ibuprofen".to_string();
        store.overwrite_unchecked(record);
        ws.save().unwrap();
        drop(ws);

        let verify = Command::VerifyProduct {
            product_id: "P1".to_string(),
        };
        assert_eq!(run(&opts(dir.path(), None), &verify).unwrap(), 2);
    }

    #[test]
    fn config_file_sets_shelf_life() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("pal.yaml");
        std::fs::write(&config, "shelf_life:\n  default_days: 30\n").unwrap();
        let state = dir.path().join("state");
        let mut o = opts(&state, Some("deployer"));
        o.config = Some(config);
        run(&o, &register("P1")).unwrap();

        let ws = Workspace::open(&state, None, None).unwrap();
        let record = ws
            .file_store()
            .unwrap()
            .get(&pal_core::ProductId::new("P1").unwrap())
            .unwrap();
        let days = (record.expires_at.epoch_secs() - record.manufactured_at.epoch_secs()) / 86_400;
        assert_eq!(days, 30);
    }

    #[test]
    fn parallel_invocations_keep_every_registration() {
        let dir = tempfile::tempdir().unwrap();
        run(&opts(dir.path(), Some("deployer")), &register("P0")).unwrap();

        let handles: Vec<_> = (1..16)
            .map(|i| {
                let o = opts(dir.path(), Some("deployer"));
                std::thread::spawn(move || run(&o, &register(&format!("P{i}"))))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().unwrap(), 0);
        }

        let ws = Workspace::open(dir.path(), None, None).unwrap();
        let store = ws.file_store().unwrap();
        for i in 0..16 {
            let product_id = pal_core::ProductId::new(format!("P{i}")).unwrap();
            assert!(ws.ledger().exists(&product_id).unwrap(), "P{i} missing from ledger");
            assert!(store.get(&product_id).is_ok(), "P{i} missing from store");
        }
        assert_eq!(store.len(), 16);
    }

    #[test]
    fn command_error_survives_failed_save() {
        let dir = tempfile::tempdir().unwrap();
        let owner = opts(dir.path(), Some("deployer"));
        run(&owner, &register("P1")).unwrap();
        // A directory where the temp file goes makes the next save fail.
        std::fs::create_dir(dir.path().join("ledger.json.tmp")).unwrap();

        let err = run(&owner, &register("P1")).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("already registered"), "{message}");
        assert!(message.contains("state could not be saved"), "{message}");
    }

    #[test]
    fn failed_save_is_reported_when_command_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        run(&opts(dir.path(), Some("deployer")), &register("P1")).unwrap();
        std::fs::create_dir(dir.path().join("ledger.json.tmp")).unwrap();

        let verify = Command::VerifyProduct {
            product_id: "P1".to_string(),
        };
        let err = run(&opts(dir.path(), None), &verify).unwrap_err();
        assert!(format!("{err:#}").contains("failed to write"));
    }

    #[test]
    fn reconcile_on_clean_state_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        run(&opts(dir.path(), Some("deployer")), &register("P1")).unwrap();
        assert_eq!(run(&opts(dir.path(), None), &Command::Reconcile).unwrap(), 0);
    }
}
