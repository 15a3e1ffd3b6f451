//! Configuration types and structures.
//!
//! This module contains the settings that drive an audit run: where the
//! definition, baseline and store configuration files live, which database
//! records and pages to inspect, and which special-case checks to apply.

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub records: RecordsConfig,

    #[serde(default)]
    pub pages: PagesConfig,

    /// Settings that live outside the configuration files.
    #[serde(default = "default_other_settings")]
    pub other_settings: Vec<OtherSetting>,

    /// Template bindings keyed by method name.
    #[serde(default)]
    pub template_bindings: IndexMap<String, TemplateBinding>,

    /// Special-case checks keyed by `Namespace.field`.
    #[serde(default = "default_validators")]
    pub validators: IndexMap<String, ValidatorSpec>,

    #[serde(default)]
    pub types: TypesConfig,

    #[serde(default)]
    pub import: ImportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            records: RecordsConfig::default(),
            pages: PagesConfig::default(),
            other_settings: default_other_settings(),
            template_bindings: IndexMap::new(),
            validators: default_validators(),
            types: TypesConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

/// File locations. Relative paths resolve against `base_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root that relative paths (including file-existence checks) resolve against.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Definitions file: namespace -> field -> description.
    #[serde(default = "default_definitions_path")]
    pub definitions: PathBuf,

    /// Shipped baseline file, read as the defaults.
    #[serde(default = "default_baseline_path")]
    pub baseline: PathBuf,

    /// Customizable copy of the baseline, created on first run.
    #[serde(default = "default_local_config_path")]
    pub local_config: PathBuf,

    /// Further static configuration files, merged after the local copy.
    #[serde(default)]
    pub config_files: Vec<PathBuf>,

    /// SQLite database holding record stores and page/step records.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            definitions: default_definitions_path(),
            baseline: default_baseline_path(),
            local_config: default_local_config_path(),
            config_files: Vec::new(),
            database: None,
        }
    }
}

impl PathsConfig {
    /// Resolve a path against `base_dir` unless it is already absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn definitions_path(&self) -> PathBuf {
        self.resolve(&self.definitions)
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.resolve(&self.baseline)
    }

    pub fn local_config_path(&self) -> PathBuf {
        self.resolve(&self.local_config)
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.as_deref().map(|p| self.resolve(p))
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_definitions_path() -> PathBuf {
    PathBuf::from("shop/_config/definitions.yaml")
}

fn default_baseline_path() -> PathBuf {
    PathBuf::from("shop/_config/shop.yaml")
}

fn default_local_config_path() -> PathBuf {
    PathBuf::from("mysite/_config/shop.yaml")
}

/// Single-record configuration stores kept in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Store names; each becomes a namespace.
    #[serde(default = "default_record_stores")]
    pub stores: Vec<String>,

    /// Fields that are bookkeeping rather than configuration.
    #[serde(default = "default_excluded_fields")]
    pub excluded_fields: Vec<String>,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            stores: default_record_stores(),
            excluded_fields: default_excluded_fields(),
        }
    }
}

fn default_record_stores() -> Vec<String> {
    vec!["EcommerceDBConfig".to_string()]
}

fn default_excluded_fields() -> Vec<String> {
    vec!["Title".to_string(), "UseThisOne".to_string()]
}

/// Page types the store relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesConfig {
    #[serde(default = "default_required_pages")]
    pub required: Vec<String>,

    #[serde(default = "default_optional_pages")]
    pub optional: Vec<String>,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            required: default_required_pages(),
            optional: default_optional_pages(),
        }
    }
}

impl PagesConfig {
    /// All page types with their required flag, required first.
    pub fn all(&self) -> impl Iterator<Item = (&str, bool)> {
        self.required
            .iter()
            .map(|p| (p.as_str(), true))
            .chain(self.optional.iter().map(|p| (p.as_str(), false)))
    }
}

fn default_required_pages() -> Vec<String> {
    vec![
        "CheckoutPage".to_string(),
        "OrderConfirmationPage".to_string(),
        "AccountPage".to_string(),
    ]
}

fn default_optional_pages() -> Vec<String> {
    vec!["CartPage".to_string()]
}

/// A setting read from outside the configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherSetting {
    pub namespace: String,
    pub field: String,
    pub description: String,

    /// Literal value.
    #[serde(default)]
    pub value: Option<Value>,

    /// Environment variable that supplies the value; wins over `value`.
    #[serde(default)]
    pub env: Option<String>,
}

fn default_other_settings() -> Vec<OtherSetting> {
    vec![
        OtherSetting {
            namespace: "Email".to_string(),
            field: "admin_email_address".to_string(),
            description: "Default administrator email.".to_string(),
            value: None,
            env: Some("SHOP_ADMIN_EMAIL".to_string()),
        },
        OtherSetting {
            namespace: "SiteConfig".to_string(),
            field: "website_title".to_string(),
            description: "The name of the website.".to_string(),
            value: None,
            env: None,
        },
        OtherSetting {
            namespace: "SiteConfig".to_string(),
            field: "website_tagline".to_string(),
            description: "The subtitle or tagline of the website.".to_string(),
            value: None,
            env: None,
        },
    ]
}

/// A template binding whose output is computed per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateBinding {
    pub description: String,

    /// Output pattern; `{id}` and `{class_name}` are substituted.
    #[serde(default)]
    pub pattern: String,
}

/// Special-case check attached to a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorSpec {
    /// The value is a path, relative to the base dir, that must exist.
    FileExists,
    /// The value names implementations of the given base type.
    Implementations(String),
}

fn default_validators() -> IndexMap<String, ValidatorSpec> {
    let mut validators = IndexMap::new();
    validators.insert(
        "Order_Email.css_file_location".to_string(),
        ValidatorSpec::FileExists,
    );
    validators.insert(
        "Order.modifiers".to_string(),
        ValidatorSpec::Implementations("OrderModifier".to_string()),
    );
    validators.insert(
        "OrderStatusLog.available_log_classes_array".to_string(),
        ValidatorSpec::Implementations("OrderStatusLog".to_string()),
    );
    validators
}

/// Known types of the storefront.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypesConfig {
    /// Namespaces that correspond to real types. Empty disables the check.
    #[serde(default)]
    pub known: Vec<String>,

    /// Base type -> concrete implementations.
    #[serde(default)]
    pub implementations: IndexMap<String, Vec<String>>,
}

/// Product bulk loader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Highest numbered `VariationN` column honored.
    #[serde(default = "default_max_variation_columns")]
    pub max_variation_columns: usize,

    /// Create product groups named in the CSV that do not exist yet.
    #[serde(default)]
    pub create_missing_groups: bool,

    /// Title of the group products land in when the CSV names none.
    #[serde(default = "default_group_title")]
    pub default_group_title: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_variation_columns: default_max_variation_columns(),
            create_missing_groups: false,
            default_group_title: default_group_title(),
        }
    }
}

fn default_max_variation_columns() -> usize {
    6
}

fn default_group_title() -> String {
    "Products".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_builtin_checks() {
        let config = Config::default();
        assert_eq!(
            config.validators.get("Order_Email.css_file_location"),
            Some(&ValidatorSpec::FileExists)
        );
        assert_eq!(config.records.excluded_fields, vec!["Title", "UseThisOne"]);
        assert_eq!(config.import.max_variation_columns, 6);
        assert_eq!(config.other_settings.len(), 3);
    }

    #[test]
    fn test_validator_spec_yaml_forms() {
        let yaml = r#"
validators:
  Shop.logo: file_exists
  Shop.payment_methods:
    implementations: PaymentMethod
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.validators.get("Shop.logo"),
            Some(&ValidatorSpec::FileExists)
        );
        assert_eq!(
            config.validators.get("Shop.payment_methods"),
            Some(&ValidatorSpec::Implementations("PaymentMethod".to_string()))
        );
    }

    #[test]
    fn test_paths_resolve_against_base_dir() {
        let paths = PathsConfig {
            base_dir: PathBuf::from("/srv/shop"),
            ..PathsConfig::default()
        };
        assert_eq!(
            paths.baseline_path(),
            PathBuf::from("/srv/shop/shop/_config/shop.yaml")
        );
        assert_eq!(
            paths.resolve(Path::new("/etc/shop.yaml")),
            PathBuf::from("/etc/shop.yaml")
        );
    }

    #[test]
    fn test_pages_all_lists_required_first() {
        let pages = PagesConfig::default();
        let all: Vec<(&str, bool)> = pages.all().collect();
        assert_eq!(all[0], ("CheckoutPage", true));
        assert_eq!(all.last(), Some(&("CartPage", false)));
    }
}
