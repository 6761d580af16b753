//! # Engine Configuration
//!
//! Loaded from YAML. Every field has a default, so an empty document (or no
//! file at all) yields a working configuration.
//!
//! ```yaml
//! shelf_life:
//!   default_days: 730
//!   overrides:
//!     Vaccine: 180
//! reconcile:
//!   min_marker_age_secs: 60
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pal_core::Timestamp;

/// Two years, the fixed window products were historically registered with.
pub const DEFAULT_SHELF_LIFE_DAYS: u32 = 730;

/// Markers younger than this are assumed to belong to a registration that
/// is still running.
pub const DEFAULT_MIN_MARKER_AGE_SECS: u64 = 60;

/// Configuration load or validation failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Expiry policy: `expiry = manufacturing + shelf life`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShelfLifePolicy {
    /// Days applied to any product type without an override.
    #[serde(default = "default_shelf_life_days")]
    pub default_days: u32,
    /// Per-product-type day counts, keyed by exact product type.
    #[serde(default)]
    pub overrides: BTreeMap<String, u32>,
}

fn default_shelf_life_days() -> u32 {
    DEFAULT_SHELF_LIFE_DAYS
}

impl Default for ShelfLifePolicy {
    fn default() -> Self {
        Self {
            default_days: DEFAULT_SHELF_LIFE_DAYS,
            overrides: BTreeMap::new(),
        }
    }
}

impl ShelfLifePolicy {
    /// Shelf life in days for `product_type`.
    pub fn days_for(&self, product_type: &str) -> u32 {
        self.overrides
            .get(product_type)
            .copied()
            .unwrap_or(self.default_days)
    }

    /// Expiry instant for a product manufactured at `manufactured_at`.
    ///
    /// `None` only if the result is outside the representable calendar.
    pub fn expiry(&self, product_type: &str, manufactured_at: Timestamp) -> Option<Timestamp> {
        manufactured_at.checked_add_days(self.days_for(product_type))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_days == 0 {
            return Err(ConfigError::Invalid(
                "shelf_life.default_days must be at least 1".to_string(),
            ));
        }
        for (product_type, days) in &self.overrides {
            if product_type.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "shelf_life.overrides has a blank product type".to_string(),
                ));
            }
            if *days == 0 {
                return Err(ConfigError::Invalid(format!(
                    "shelf_life.overrides.{product_type} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

/// Reconciliation sweep tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    #[serde(default = "default_min_marker_age_secs")]
    pub min_marker_age_secs: u64,
}

fn default_min_marker_age_secs() -> u64 {
    DEFAULT_MIN_MARKER_AGE_SECS
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            min_marker_age_secs: DEFAULT_MIN_MARKER_AGE_SECS,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub shelf_life: ShelfLifePolicy,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl EngineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.shelf_life.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }
}
