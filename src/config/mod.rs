//! Tool configuration.
//!
//! Consolidates configuration from four tiers with field-by-field YAML merging:
//! 1. **Defaults** - Compiled in
//! 2. **Project** - `$CWD/shop-audit/config.yaml`
//! 3. **User** - `~/.shop-audit/config.yaml`
//! 4. **Environment** - variables listed below
//!
//! ## Environment Variables
//! - `SHOP_AUDIT_CONFIG_PATH` - Explicit config file (replaces tiering)
//! - `SHOP_AUDIT_DB_PATH` - Database path
//! - `SHOP_AUDIT_BASE_DIR` - Base directory for relative paths
//! - `SHOP_AUDIT_USER_DIR` - User config dir (default: `~/.shop-audit`)
//! - `SHOP_AUDIT_PROJECT_DIR` - Project config dir (default: `./shop-audit`)

mod loader;
mod merge;
mod types;

pub use loader::{CONFIG_FILE_NAME, ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
