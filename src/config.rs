//! Configuration management for chat-history-repair
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, RepairError};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where workspace directories live
    #[serde(default)]
    pub storage: StorageConfig,
    /// Defaults for repair flags
    #[serde(default)]
    pub repair: RepairDefaults,
}

/// Storage location settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Explicit workspace storage root; derived from `product` when unset
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Editor product directory name, e.g. `Code`, `Code - Insiders`, `VSCodium`
    #[serde(default = "default_product")]
    pub product: String,
}

fn default_product() -> String {
    "Code".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            product: default_product(),
        }
    }
}

/// Repair behavior defaults; CLI flags can only turn these on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairDefaults {
    /// Drop orphaned index entries
    #[serde(default)]
    pub remove_orphans: bool,

    /// Copy orphaned sessions back from other workspaces
    #[serde(default)]
    pub recover_orphans: bool,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file; a missing file means defaults
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: Option<&str>, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = match path {
            Some(path) if Path::new(path).exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::warn!("Config file not found at {}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RepairError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| RepairError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(root) = std::env::var("CHAT_REPAIR_STORAGE_ROOT") {
            if !root.is_empty() {
                self.storage.root = Some(PathBuf::from(root));
            }
        }

        if let Ok(product) = std::env::var("CHAT_REPAIR_PRODUCT") {
            self.storage.product = product;
        }

        if let Ok(value) = std::env::var("CHAT_REPAIR_REMOVE_ORPHANS") {
            match parse_bool(&value) {
                Some(flag) => self.repair.remove_orphans = flag,
                None => tracing::warn!("Invalid CHAT_REPAIR_REMOVE_ORPHANS value: {}", value),
            }
        }

        if let Ok(value) = std::env::var("CHAT_REPAIR_RECOVER_ORPHANS") {
            match parse_bool(&value) {
                Some(flag) => self.repair.recover_orphans = flag,
                None => tracing::warn!("Invalid CHAT_REPAIR_RECOVER_ORPHANS value: {}", value),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(root) = &cli.storage_root {
            self.storage.root = Some(root.clone());
        }
    }

    /// Resolve the workspace storage root
    ///
    /// An explicit root wins; otherwise the platform's configuration
    /// directory plus `<product>/User/workspaceStorage` is used.
    ///
    /// # Errors
    ///
    /// Returns error when no explicit root is set and the home directory
    /// cannot be determined
    pub fn storage_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.storage.root {
            return Ok(root.clone());
        }
        let base = BaseDirs::new().ok_or_else(|| {
            RepairError::Config("Could not determine the user configuration directory".into())
        })?;
        Ok(default_storage_root(base.config_dir(), &self.storage.product))
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.storage.product.trim().is_empty() {
            return Err(
                RepairError::Config("storage.product cannot be empty".to_string()).into(),
            );
        }

        if self
            .storage
            .product
            .contains(|c: char| c == '/' || c == '\\')
        {
            return Err(RepairError::Config(format!(
                "storage.product must be a directory name, got: {}",
                self.storage.product
            ))
            .into());
        }

        if let Some(root) = &self.storage.root {
            if root.as_os_str().is_empty() {
                return Err(
                    RepairError::Config("storage.root cannot be empty".to_string()).into(),
                );
            }
        }

        Ok(())
    }
}

/// `<config dir>/<product>/User/workspaceStorage`
pub fn default_storage_root(config_dir: &Path, product: &str) -> PathBuf {
    config_dir.join(product).join("User").join("workspaceStorage")
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
