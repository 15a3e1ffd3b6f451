//! Reconciliation report.
//!
//! A [`Report`] bundles the ordered entries of one run with the consistency
//! warnings derived from them. It is plain data: the text and summary
//! renderers live in [`render`], and anything else can serialize it.

mod render;

pub use render::SummaryView;

use crate::collect::{BootstrapOutcome, RunContext};
use crate::error::AuditError;
use crate::types::{Classification, ConfigKey, Provenance, ReconciliationEntry};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use regex_lite::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::warn;

/// Kind of consistency warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    OrphanedNamespace,
    UndocumentedKey,
    UnknownNamespace,
    DanglingReference,
    ValidatorFailure,
    BootstrapCreated,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::OrphanedNamespace => "orphaned namespace",
            WarningKind::UndocumentedKey => "undocumented key",
            WarningKind::UnknownNamespace => "unknown namespace",
            WarningKind::DanglingReference => "dangling reference",
            WarningKind::ValidatorFailure => "validator failure",
            WarningKind::BootstrapCreated => "local configuration created",
        }
    }
}

/// A consistency warning about the configuration as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Key, namespace or file the warning is about.
    pub subject: String,
    /// Namespace the warning belongs to, for filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            namespace: None,
            message: message.into(),
        }
    }

    fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }
}

/// Number of entries per classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    pub orphaned_in_config: usize,
    pub missing_definition_source: usize,
    pub undocumented: usize,
    pub customized: usize,
    pub matches_default: usize,
}

impl ClassificationCounts {
    pub fn from_entries(entries: &[ReconciliationEntry]) -> Self {
        let mut counts = Self::default();
        for entry in entries {
            *counts.slot(entry.classification) += 1;
        }
        counts
    }

    fn slot(&mut self, classification: Classification) -> &mut usize {
        match classification {
            Classification::OrphanedInConfig => &mut self.orphaned_in_config,
            Classification::MissingDefinitionSource => &mut self.missing_definition_source,
            Classification::Undocumented => &mut self.undocumented,
            Classification::Customized => &mut self.customized,
            Classification::MatchesDefault => &mut self.matches_default,
        }
    }

    pub fn get(&self, classification: Classification) -> usize {
        match classification {
            Classification::OrphanedInConfig => self.orphaned_in_config,
            Classification::MissingDefinitionSource => self.missing_definition_source,
            Classification::Undocumented => self.undocumented,
            Classification::Customized => self.customized,
            Classification::MatchesDefault => self.matches_default,
        }
    }

    pub fn total(&self) -> usize {
        Classification::ALL.iter().map(|c| self.get(*c)).sum()
    }

    pub fn issues(&self) -> usize {
        Classification::ALL
            .iter()
            .filter(|c| c.is_issue())
            .map(|c| self.get(*c))
            .sum()
    }
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub files_used: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapOutcome>,
    pub entries: Vec<ReconciliationEntry>,
    pub warnings: Vec<Warning>,
    pub counts: ClassificationCounts,
}

impl Report {
    /// Assemble the report and derive its consistency warnings.
    pub fn build(
        entries: Vec<ReconciliationEntry>,
        ctx: &RunContext,
        validator_failures: &[AuditError],
    ) -> Self {
        let mut warnings = Vec::new();

        if let Some(outcome) = ctx.bootstrap().filter(|o| o.created()) {
            warnings.push(Warning::new(
                WarningKind::BootstrapCreated,
                outcome.path().display().to_string(),
                "A new local configuration file was created from the shipped baseline; \
                 review it before going live.",
            ));
        }

        for entry in &entries {
            match entry.classification {
                Classification::OrphanedInConfig => warnings.push(
                    Warning::new(
                        WarningKind::OrphanedNamespace,
                        &entry.namespace,
                        format!(
                            "{} is not defined anywhere; remove from your config as these are \
                             superfluous: {}",
                            entry.namespace,
                            entry.orphaned_fields.join(", ")
                        ),
                    )
                    .in_namespace(&entry.namespace),
                ),
                Classification::Undocumented => warnings.push(
                    Warning::new(
                        WarningKind::UndocumentedKey,
                        entry.label(),
                        format!("{} has no description.", entry.label()),
                    )
                    .in_namespace(&entry.namespace),
                ),
                _ => {}
            }
        }

        if ctx.catalog.checks_enabled() {
            let configured: IndexSet<&str> = entries
                .iter()
                .filter(|e| e.provenance != Provenance::BaselineFallback)
                .map(|e| e.namespace.as_str())
                .collect();
            for namespace in configured {
                if !ctx.catalog.is_known(namespace) {
                    warn!("Configured namespace {} is not a known type", namespace);
                    warnings.push(
                        Warning::new(
                            WarningKind::UnknownNamespace,
                            namespace,
                            format!("{} does not name a known type.", namespace),
                        )
                        .in_namespace(namespace),
                    );
                }
            }
        }

        warnings.extend(dangling_references(&entries));

        for failure in validator_failures {
            let subject = failure.resource.clone().unwrap_or_default();
            let namespace = ConfigKey::parse(&subject).map(|k| k.namespace);
            let mut warning =
                Warning::new(WarningKind::ValidatorFailure, subject, failure.message.clone());
            warning.namespace = namespace;
            warnings.push(warning);
        }

        Self {
            generated_at: Utc::now(),
            files_used: ctx.files_used().to_vec(),
            bootstrap: ctx.bootstrap().cloned(),
            counts: ClassificationCounts::from_entries(&entries),
            entries,
            warnings,
        }
    }

    /// Keep only the given namespaces. Warnings without a namespace stay.
    pub fn filter_namespaces(&mut self, namespaces: &[String]) {
        let wanted = |ns: &str| namespaces.iter().any(|n| n == ns);
        self.entries.retain(|e| wanted(&e.namespace));
        self.warnings
            .retain(|w| w.namespace.as_deref().is_none_or(wanted));
        self.counts = ClassificationCounts::from_entries(&self.entries);
    }

    /// Keep only entries that point at something to clean up, plus entries
    /// carrying warnings.
    pub fn only_issues(&mut self) {
        self.entries
            .retain(|e| e.classification.is_issue() || !e.warnings.is_empty());
        self.counts = ClassificationCounts::from_entries(&self.entries);
    }

    /// No issues and no warnings.
    pub fn is_clean(&self) -> bool {
        self.counts.issues() == 0 && self.warnings.is_empty()
    }

    /// Entries with a given classification, in report order.
    pub fn entries_with(&self, classification: Classification) -> Vec<&ReconciliationEntry> {
        self.entries
            .iter()
            .filter(|e| e.classification == classification)
            .collect()
    }
}

/// `{{Namespace.field}}` cross-reference in a description.
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_\\]+)\.([A-Za-z0-9_]+)\s*\}\}")
        .expect("reference pattern is valid")
});

/// `{{Namespace.field}}` references in descriptions that name no entry.
fn dangling_references(entries: &[ReconciliationEntry]) -> Vec<Warning> {
    let pattern = &*REFERENCE_PATTERN;

    let mut known: HashSet<(String, String)> = HashSet::new();
    for entry in entries {
        match &entry.field {
            Some(field) => {
                known.insert((entry.namespace.clone(), field.clone()));
            }
            None => {
                for field in &entry.orphaned_fields {
                    known.insert((entry.namespace.clone(), field.clone()));
                }
            }
        }
    }

    let mut warnings = Vec::new();
    for entry in entries {
        let Some(description) = &entry.description else {
            continue;
        };
        for captures in pattern.captures_iter(description) {
            let namespace = &captures[1];
            let field = &captures[2];
            if !known.contains(&(namespace.to_string(), field.to_string())) {
                warnings.push(
                    Warning::new(
                        WarningKind::DanglingReference,
                        entry.label(),
                        format!(
                            "The description of {} refers to {}.{}, which does not exist.",
                            entry.label(),
                            namespace,
                            field
                        ),
                    )
                    .in_namespace(&entry.namespace),
                );
            }
        }
    }
    warnings
}
