//! Reconciliation of definitions, live configs and baseline defaults.
//!
//! Every key in the union of the three tables yields exactly one entry, except
//! that all fields of a namespace configured but never defined collapse into a
//! single namespace-level `orphaned-in-config` entry. Output order is
//! namespace first-seen order (configs, then definitions, then defaults) and
//! field insertion order within a namespace.

use crate::error::AuditResult;
use crate::normalize::{normalize, normalize_opt};
use crate::types::{
    Classification, Provenance, ProvenanceTable, ReconciliationEntry, Table, ValueView, section,
};
use indexmap::IndexSet;
use serde_json::Value;
use tracing::debug;

/// Reconcile the three tables into an ordered entry sequence.
///
/// Pure: performs no I/O. Fails only when a namespace is not a mapping.
pub fn reconcile(
    definitions: &Table,
    configs: &Table,
    defaults: &Table,
    provenance: &ProvenanceTable,
) -> AuditResult<Vec<ReconciliationEntry>> {
    let namespaces = namespace_universe(definitions, configs, defaults);
    let mut entries = Vec::new();

    for namespace in namespaces {
        let config_fields = section(configs, namespace)?;
        let definition_fields = section(definitions, namespace)?;
        let default_fields = section(defaults, namespace)?;

        // Namespace-level absence supersedes everything else.
        if configs.contains_key(namespace) && !definitions.contains_key(namespace) {
            entries.push(orphaned_namespace(
                namespace,
                configs.get(namespace).cloned().unwrap_or(Value::Null),
                config_fields,
            ));
            continue;
        }

        let mut fields: IndexSet<&str> = IndexSet::new();
        for table in [config_fields, definition_fields, default_fields]
            .into_iter()
            .flatten()
        {
            fields.extend(table.keys().map(String::as_str));
        }

        for field in fields {
            let description = definition_fields
                .and_then(|d| d.get(field))
                .map(description_text);
            let default = default_fields.and_then(|d| d.get(field));
            let live = config_fields.and_then(|c| c.get(field));

            let (live_raw, source) = match live {
                Some(value) => (
                    value.clone(),
                    provenance
                        .get(namespace, field)
                        .unwrap_or(Provenance::StaticOverride),
                ),
                None => (
                    default.cloned().unwrap_or(Value::Null),
                    Provenance::BaselineFallback,
                ),
            };

            let classification = classify(description.is_some(), live, default);

            entries.push(ReconciliationEntry {
                namespace: namespace.to_string(),
                field: Some(field.to_string()),
                description,
                live: ValueView::new(live_raw),
                default: default.cloned().map(ValueView::new),
                provenance: source,
                classification,
                orphaned_fields: Vec::new(),
                special_check: None,
                warnings: Vec::new(),
            });
        }
    }

    debug!("Reconciled {} entries", entries.len());
    Ok(entries)
}

/// Classify a key whose namespace is defined.
///
/// Precedence: missing-definition-source > undocumented > matches-default >
/// customized.
fn classify(documented: bool, live: Option<&Value>, default: Option<&Value>) -> Classification {
    let Some(live) = live else {
        return if documented {
            Classification::MissingDefinitionSource
        } else {
            Classification::Undocumented
        };
    };
    if !documented {
        return Classification::Undocumented;
    }
    if normalize(live) == normalize_opt(default) {
        Classification::MatchesDefault
    } else {
        Classification::Customized
    }
}

fn orphaned_namespace(
    namespace: &str,
    raw: Value,
    fields: Option<&Table>,
) -> ReconciliationEntry {
    ReconciliationEntry {
        namespace: namespace.to_string(),
        field: None,
        description: None,
        live: ValueView::new(raw),
        default: None,
        provenance: Provenance::StaticOverride,
        classification: Classification::OrphanedInConfig,
        orphaned_fields: fields
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default(),
        special_check: None,
        warnings: Vec::new(),
    }
}

/// Namespaces in report order.
fn namespace_universe<'a>(
    definitions: &'a Table,
    configs: &'a Table,
    defaults: &'a Table,
) -> IndexSet<&'a str> {
    configs
        .keys()
        .chain(definitions.keys())
        .chain(defaults.keys())
        .map(String::as_str)
        .collect()
}

/// Definitions are normally strings; anything else is shown as written.
fn description_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
