//! # Local State Directory
//!
//! The CLI keeps its state as JSON files in one directory (default `./.pal`):
//!
//! - `ledger.json`: the ledger snapshot (root identity and event log).
//! - `store.json`: product records, unless `DATABASE_URL` selects Postgres.
//! - `pending.json`: pending-registration markers, likewise.
//!
//! The first command that runs against an empty directory bootstraps the
//! ledger with the invoking identity as root. State is written back after
//! every command, including failed ones, so a partial commit is never lost.
//!
//! A [`Workspace`] holds an exclusive lock on `.lock` in the directory from
//! load until it is dropped, so concurrent invocations run one at a time
//! and never overwrite each other's snapshots.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use pal_core::{Clock, Identity, SystemClock};
use pal_engine::{EngineConfig, ReconciliationEngine};
use pal_ledger::{InMemoryLedger, LedgerSnapshot};
use pal_store::{
    InMemoryMetadataStore, InMemoryPendingStore, MetadataStore, PendingRegistration,
    PendingRegistrationStore, PgMetadataStore, ProductRecord,
};

pub const LEDGER_FILE: &str = "ledger.json";
pub const STORE_FILE: &str = "store.json";
pub const PENDING_FILE: &str = "pending.json";
pub const LOCK_FILE: &str = ".lock";

enum Backend {
    Files {
        store: Arc<InMemoryMetadataStore>,
        pending: Arc<InMemoryPendingStore>,
    },
    Postgres(Arc<PgMetadataStore>),
}

/// Loaded state for one CLI invocation.
pub struct Workspace {
    dir: PathBuf,
    ledger: Arc<InMemoryLedger>,
    backend: Backend,
    // Released when the file is closed on drop.
    _lock: File,
}

fn lock_dir(dir: &Path) -> Result<File> {
    let path = dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("failed to lock {}", path.display()))?;
    tracing::debug!(path = %path.display(), "state directory locked");
    Ok(file)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

impl Workspace {
    /// Load state from `dir`.
    ///
    /// `caller` is required only when no ledger exists yet. With a
    /// `database_url`, records and markers live in Postgres instead of the
    /// state directory.
    pub fn open(
        dir: &Path,
        caller: Option<&Identity>,
        database_url: Option<&str>,
    ) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create state directory {}", dir.display()))?;
        let lock = lock_dir(dir)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let ledger = match read_json::<LedgerSnapshot>(&dir.join(LEDGER_FILE))? {
            Some(snapshot) => InMemoryLedger::from_snapshot(snapshot, clock)
                .context("ledger snapshot failed verification")?,
            None => {
                let Some(root) = caller else {
                    bail!(
                        "no ledger in {}; run a command with --as <identity> to bootstrap one",
                        dir.display()
                    );
                };
                tracing::info!(root = %root, dir = %dir.display(), "bootstrapping new ledger");
                InMemoryLedger::bootstrap(root.clone(), clock)?
            }
        };

        let backend = match database_url {
            Some(url) => Backend::Postgres(Arc::new(
                PgMetadataStore::connect(url).context("failed to open Postgres metadata store")?,
            )),
            None => {
                let records: Vec<ProductRecord> =
                    read_json(&dir.join(STORE_FILE))?.unwrap_or_default();
                let markers: Vec<PendingRegistration> =
                    read_json(&dir.join(PENDING_FILE))?.unwrap_or_default();
                Backend::Files {
                    store: Arc::new(
                        InMemoryMetadataStore::from_records(records)
                            .context("store.json holds duplicate products")?,
                    ),
                    pending: Arc::new(
                        InMemoryPendingStore::from_markers(markers)
                            .context("pending.json holds duplicate markers")?,
                    ),
                }
            }
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            ledger: Arc::new(ledger),
            backend,
            _lock: lock,
        })
    }

    /// Build an engine over this workspace's dependencies.
    pub fn engine(&self, config: EngineConfig) -> ReconciliationEngine {
        let (store, pending): (Arc<dyn MetadataStore>, Arc<dyn PendingRegistrationStore>) =
            match &self.backend {
                Backend::Files { store, pending } => (store.clone(), pending.clone()),
                Backend::Postgres(pg) => (pg.clone(), pg.clone()),
            };
        ReconciliationEngine::new(
            self.ledger.clone(),
            store,
            pending,
            Arc::new(SystemClock),
            config,
        )
    }

    /// Write state back to the directory.
    ///
    /// The live event chain is re-checked first; a ledger that fails it is
    /// never persisted.
    pub fn save(&self) -> Result<()> {
        self.ledger
            .verify_chain()
            .context("ledger event chain failed verification; state not saved")?;
        write_json(&self.dir.join(LEDGER_FILE), &self.ledger.snapshot())?;
        if let Backend::Files { store, pending } = &self.backend {
            write_json(&self.dir.join(STORE_FILE), &store.records())?;
            write_json(&self.dir.join(PENDING_FILE), &pending.list_pending()?)?;
        }
        Ok(())
    }

    /// Direct access to the file-backed store, for out-of-band edits.
    pub fn file_store(&self) -> Option<&InMemoryMetadataStore> {
        match &self.backend {
            Backend::Files { store, .. } => Some(store.as_ref()),
            Backend::Postgres(_) => None,
        }
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }
}
