//! Per-run state shared by providers, validators and the report.

use super::bootstrap::BootstrapOutcome;
use crate::config::TypesConfig;
use crate::db::records::{InstanceKind, RecordInstance};
use crate::error::AuditResult;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source of page and step records.
pub trait InstanceSource {
    fn list_instances(&self, kind: InstanceKind) -> AuditResult<Vec<RecordInstance>>;
}

/// Known storefront types and their implementations.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    known: IndexSet<String>,
    implementations: IndexMap<String, Vec<String>>,
    synthetic: IndexSet<String>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(types: &TypesConfig) -> Self {
        Self {
            known: types.known.iter().cloned().collect(),
            implementations: types.implementations.clone(),
            synthetic: IndexSet::new(),
        }
    }

    /// Declare a namespace that groups records rather than naming a type.
    pub fn register_namespace(&mut self, namespace: &str) {
        self.synthetic.insert(namespace.to_string());
    }

    pub fn register_implementation(&mut self, base: &str, implementation: &str) {
        let list = self.implementations.entry(base.to_string()).or_default();
        if !list.iter().any(|i| i == implementation) {
            list.push(implementation.to_string());
        }
    }

    /// Unknown-namespace checks only run when types have been declared.
    pub fn checks_enabled(&self) -> bool {
        !self.known.is_empty()
    }

    pub fn is_known(&self, namespace: &str) -> bool {
        self.known.contains(namespace)
            || self.synthetic.contains(namespace)
            || self.implementations.contains_key(namespace)
            || self
                .implementations
                .values()
                .any(|impls| impls.iter().any(|i| i == namespace))
    }

    pub fn implementations_of(&self, base: &str) -> &[String] {
        self.implementations
            .get(base)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Explicit state for one reconciliation run.
///
/// Nothing here outlives the run, so repeated or concurrent runs cannot
/// interfere with each other.
#[derive(Debug, Default)]
pub struct RunContext {
    base_dir: PathBuf,
    pub catalog: TypeCatalog,
    instance_cache: HashMap<InstanceKind, Vec<RecordInstance>>,
    files_used: Vec<PathBuf>,
    configured_namespaces: Vec<String>,
    bootstrap: Option<BootstrapOutcome>,
}

impl RunContext {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Instances of one kind, fetched once per run.
    pub fn instances(
        &mut self,
        source: &dyn InstanceSource,
        kind: InstanceKind,
    ) -> AuditResult<&[RecordInstance]> {
        if !self.instance_cache.contains_key(&kind) {
            let listed = source.list_instances(kind)?;
            self.instance_cache.insert(kind, listed);
        }
        Ok(self
            .instance_cache
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    pub fn note_file_used(&mut self, path: &Path) {
        if !self.files_used.iter().any(|p| p == path) {
            self.files_used.push(path.to_path_buf());
        }
    }

    pub fn files_used(&self) -> &[PathBuf] {
        &self.files_used
    }

    /// Record a namespace a source configures, even one with no fields.
    pub fn note_namespace(&mut self, namespace: &str) {
        self.configured_namespaces.push(namespace.to_string());
    }

    /// Namespaces noted since the last call.
    pub fn take_namespaces(&mut self) -> Vec<String> {
        std::mem::take(&mut self.configured_namespaces)
    }

    pub fn set_bootstrap(&mut self, outcome: BootstrapOutcome) {
        self.bootstrap = Some(outcome);
    }

    pub fn bootstrap(&self) -> Option<&BootstrapOutcome> {
        self.bootstrap.as_ref()
    }
}
