//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the configuration file inside each tier directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority)
    Defaults = 0,
    /// Project-level config ($CWD/shop-audit/)
    Project = 1,
    /// User-level config (~/.shop-audit/)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories for each configuration tier.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project-level config directory
    pub project_dir: Option<PathBuf>,
    /// User-level config directory
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: SHOP_AUDIT_USER_DIR or ~/.shop-audit
        let user_dir = std::env::var("SHOP_AUDIT_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".shop-audit")));

        // Project dir: SHOP_AUDIT_PROJECT_DIR or $CWD/shop-audit
        let project_dir = std::env::var("SHOP_AUDIT_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("shop-audit")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    /// Loaded configuration
    config: Config,
    /// Config files that contributed, lowest tier first
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    ///
    /// `SHOP_AUDIT_CONFIG_PATH` names a single file that replaces tiering.
    pub fn load() -> Result<Self> {
        if let Ok(explicit_path) = std::env::var("SHOP_AUDIT_CONFIG_PATH") {
            return Self::load_explicit(PathBuf::from(explicit_path));
        }
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load a single explicit configuration file (plus environment overrides).
    pub fn load_explicit(path: PathBuf) -> Result<Self> {
        let mut config = Config::load(&path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
        Self::apply_env_overrides(&mut config);
        Ok(Self {
            paths: ConfigPaths::with_dirs(None, None),
            config,
            sources: vec![(ConfigTier::Project, path)],
        })
    }

    /// Load configuration with explicit tier directories.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        let mut layers: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        // Tier 1: Defaults (embedded)
        layers.push(serde_json::to_value(Config::default())?);

        // Tier 2: Project config, Tier 3: User config
        for (tier, dir) in [
            (ConfigTier::Project, paths.project_dir.as_deref()),
            (ConfigTier::User, paths.user_dir.as_deref()),
        ] {
            let Some(dir) = dir else { continue };
            let config_file = dir.join(CONFIG_FILE_NAME);
            if let Some(layer) = read_layer(&config_file) {
                debug!("Loaded {} config from {}", tier, config_file.display());
                layers.push(layer);
                sources.push((tier, config_file));
            }
        }

        let merged = deep_merge_all(layers);
        let mut config: Config = serde_json::from_value(merged)?;

        // Tier 4: Environment variable overrides
        Self::apply_env_overrides(&mut config);

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides(config: &mut Config) {
        if let Ok(db_path) = std::env::var("SHOP_AUDIT_DB_PATH") {
            config.paths.database = Some(PathBuf::from(db_path));
        }

        if let Ok(base_dir) = std::env::var("SHOP_AUDIT_BASE_DIR") {
            config.paths.base_dir = PathBuf::from(base_dir);
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Config files that contributed, lowest tier first.
    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }

    /// Get the project directory.
    pub fn project_dir(&self) -> Option<&Path> {
        self.paths.project_dir.as_deref()
    }

    /// Get the user directory.
    pub fn user_dir(&self) -> Option<&Path> {
        self.paths.user_dir.as_deref()
    }
}

/// Read one YAML tier. Unreadable or malformed files are skipped with a warning.
fn read_layer(path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Skipping unreadable config {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Skipping malformed config {}: {}", path.display(), e);
            None
        }
    }
}
