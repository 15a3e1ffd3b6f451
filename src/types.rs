//! Core types for configuration reconciliation.

use crate::error::{AuditError, AuditResult};
use crate::normalize::{NormalizedValue, normalize};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Ordered two-level mapping: namespace -> field -> value.
///
/// Relies on `serde_json`'s `preserve_order` feature so namespace and field
/// order follow insertion order.
pub type Table = Map<String, Value>;

/// Marker used when a source declares no default for a field.
pub const NO_DEFAULT_SET: &str = "[no default set]";

/// Marker used when a record type declares no default for one of its fields.
pub const DEFAULT_NOT_SET: &str = "[default not set]";

/// A `(namespace, field)` configuration key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigKey {
    pub namespace: String,
    pub field: String,
}

impl ConfigKey {
    pub fn new(namespace: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            field: field.into(),
        }
    }

    /// Parse a dotted `Namespace.field` key. The field may itself contain dots.
    pub fn parse(s: &str) -> Option<Self> {
        let (namespace, field) = s.split_once('.')?;
        if namespace.is_empty() || field.is_empty() {
            return None;
        }
        Some(Self::new(namespace, field))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.field)
    }
}

/// Which source category supplied a live value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Declared in a static configuration file.
    #[default]
    StaticOverride,
    /// Read from a database-backed record.
    Database,
    /// Computed at run time.
    Computed,
    /// Supplied by some other mechanism (site settings, mail settings).
    Other,
    /// No source contributed; the baseline value stands in.
    BaselineFallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::StaticOverride => "static-override",
            Provenance::Database => "database",
            Provenance::Computed => "computed",
            Provenance::Other => "other",
            Provenance::BaselineFallback => "baseline-fallback",
        }
    }

    /// Note shown next to values that are not edited in configuration files.
    pub fn source_note(&self) -> Option<&'static str> {
        match self {
            Provenance::Database => Some("Values are set in the database using the CMS."),
            Provenance::Other => Some("Value is set outside the configuration files."),
            _ => None,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reconciling one key (or one orphaned namespace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    MatchesDefault,
    Customized,
    Undocumented,
    MissingDefinitionSource,
    OrphanedInConfig,
}

impl Classification {
    /// All classifications in report order.
    pub const ALL: [Classification; 5] = [
        Classification::OrphanedInConfig,
        Classification::MissingDefinitionSource,
        Classification::Undocumented,
        Classification::Customized,
        Classification::MatchesDefault,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::MatchesDefault => "matches-default",
            Classification::Customized => "customized",
            Classification::Undocumented => "undocumented",
            Classification::MissingDefinitionSource => "missing-definition-source",
            Classification::OrphanedInConfig => "orphaned-in-config",
        }
    }

    /// Whether the classification points at something to clean up.
    pub fn is_issue(&self) -> bool {
        matches!(
            self,
            Classification::Undocumented
                | Classification::MissingDefinitionSource
                | Classification::OrphanedInConfig
        )
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value in both normalized and raw form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueView {
    pub normalized: NormalizedValue,
    pub raw: Value,
}

impl ValueView {
    pub fn new(raw: Value) -> Self {
        Self {
            normalized: normalize(&raw),
            raw,
        }
    }
}

/// One row of the reconciliation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub namespace: String,
    /// `None` for namespace-level entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// `None` when the key is undocumented.
    pub description: Option<String>,
    pub live: ValueView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ValueView>,
    pub provenance: Provenance,
    pub classification: Classification,
    /// Fields carried by an orphaned namespace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orphaned_fields: Vec<String>,
    /// Output of a special-case validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_check: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ReconciliationEntry {
    /// The key of a per-field entry.
    pub fn key(&self) -> Option<ConfigKey> {
        self.field
            .as_ref()
            .map(|field| ConfigKey::new(&self.namespace, field))
    }

    /// `Namespace.field`, or just `Namespace` for namespace-level entries.
    pub fn label(&self) -> String {
        match &self.field {
            Some(field) => format!("{}.{}", self.namespace, field),
            None => self.namespace.clone(),
        }
    }
}

/// Provenance recorded per key while collecting sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvenanceTable(IndexMap<ConfigKey, Provenance>);

impl ProvenanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: ConfigKey, provenance: Provenance) {
        self.0.insert(key, provenance);
    }

    pub fn get(&self, namespace: &str, field: &str) -> Option<Provenance> {
        self.0.get(&ConfigKey::new(namespace, field)).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Look up one namespace of a table, checking its shape.
///
/// Absent and `null` namespaces both read as `None`.
pub fn section<'a>(table: &'a Table, namespace: &str) -> AuditResult<Option<&'a Table>> {
    match table.get(namespace) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(AuditError::invalid_shape(
            namespace,
            &format!("expected a mapping of fields, found {}", value_kind(other)),
        )),
    }
}

/// Convert a parsed document into a table, checking the two-level shape.
///
/// `null` namespaces become empty mappings.
pub fn into_table(value: Value, source: &str) -> AuditResult<Table> {
    let top = match value {
        Value::Null => return Ok(Table::new()),
        Value::Object(map) => map,
        other => {
            return Err(AuditError::invalid_shape(
                source,
                &format!("expected a mapping of namespaces, found {}", value_kind(&other)),
            ));
        }
    };

    let mut table = Table::new();
    for (namespace, fields) in top {
        match fields {
            Value::Null => {
                table.insert(namespace, Value::Object(Map::new()));
            }
            Value::Object(_) => {
                table.insert(namespace, fields);
            }
            other => {
                return Err(AuditError::invalid_shape(
                    &namespace,
                    &format!("expected a mapping of fields, found {}", value_kind(&other)),
                )
                .with_details(format!("in {}", source)));
            }
        }
    }
    Ok(table)
}

/// Set `namespace.field` in a table, creating the namespace if needed.
pub fn insert_value(table: &mut Table, key: &ConfigKey, value: Value) {
    let section = table
        .entry(key.namespace.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if !section.is_object() {
        *section = Value::Object(Map::new());
    }
    if let Value::Object(fields) = section {
        fields.insert(key.field.clone(), value);
    }
}

/// Human-readable name of a JSON value's kind.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_key_parse() {
        let key = ConfigKey::parse("Order_Email.css_file_location").unwrap();
        assert_eq!(key.namespace, "Order_Email");
        assert_eq!(key.field, "css_file_location");
        assert_eq!(key.to_string(), "Order_Email.css_file_location");
        assert!(ConfigKey::parse("NoDot").is_none());
        assert!(ConfigKey::parse(".field").is_none());
    }

    #[test]
    fn test_into_table_accepts_null_namespaces() {
        let table = into_table(json!({"Order": null, "Cart": {"a": 1}}), "test").unwrap();
        assert_eq!(table["Order"], json!({}));
        assert_eq!(table["Cart"], json!({"a": 1}));
    }

    #[test]
    fn test_into_table_rejects_scalar_namespace() {
        let err = into_table(json!({"Order": "oops"}), "test.yaml").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidConfigShape);
        assert_eq!(err.resource.as_deref(), Some("Order"));
    }

    #[test]
    fn test_into_table_preserves_order() {
        let table = into_table(json!({"Zeta": {}, "Alpha": {}, "Mid": {}}), "t").unwrap();
        let names: Vec<&String> = table.keys().collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_insert_value_creates_namespace() {
        let mut table = Table::new();
        insert_value(&mut table, &ConfigKey::new("Email", "admin"), json!("a@b.c"));
        insert_value(&mut table, &ConfigKey::new("Email", "admin"), json!("x@y.z"));
        assert_eq!(table, *json!({"Email": {"admin": "x@y.z"}}).as_object().unwrap());
    }

    #[test]
    fn test_classification_serializes_kebab() {
        let v = serde_json::to_value(Classification::MissingDefinitionSource).unwrap();
        assert_eq!(v, json!("missing-definition-source"));
        assert_eq!(Provenance::BaselineFallback.as_str(), "baseline-fallback");
    }
}
