//! Reading two-level YAML tables from disk.

use crate::config::deep_merge_all;
use crate::error::{AuditError, AuditResult};
use crate::types::{Table, into_table};
use serde_json::Value;
use std::path::Path;

/// Read a YAML file as a table.
///
/// Missing, unreadable or unparsable files are `SourceUnavailable`; a file
/// that parses but is not a namespace -> field mapping is `InvalidConfigShape`.
pub fn read_table(path: &Path) -> AuditResult<Table> {
    let label = path.display().to_string();
    let content =
        std::fs::read_to_string(path).map_err(|e| AuditError::source_unavailable(&label, e))?;
    let value: Value = serde_yaml::from_str(&content).map_err(|e| {
        AuditError::source_unavailable(&label, "malformed YAML").with_details(e.to_string())
    })?;
    into_table(value, &label)
}

/// Read several YAML files and deep-merge them, later files winning.
pub fn read_merged_tables(paths: &[&Path]) -> AuditResult<Table> {
    let mut layers = Vec::with_capacity(paths.len());
    for path in paths {
        layers.push(Value::Object(read_table(path)?));
    }
    into_table(deep_merge_all(layers), "merged configuration")
}
