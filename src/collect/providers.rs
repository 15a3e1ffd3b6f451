//! Built-in configuration source providers.
//!
//! Each provider turns one kind of source into [`ProvidedEntry`] values. The
//! collector invokes them in a fixed priority order; later providers
//! overwrite earlier ones key by key.

use super::context::{InstanceSource, RunContext};
use super::files::read_merged_tables;
use crate::config::{OtherSetting, TemplateBinding};
use crate::db::Database;
use crate::db::records::{InstanceKind, RecordInstance, StoreRecord};
use crate::error::{AuditError, AuditResult};
use crate::types::{ConfigKey, NO_DEFAULT_SET, Provenance};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

/// Class name of the page that hosts checkout steps.
pub const CHECKOUT_PAGE: &str = "CheckoutPage";

/// Namespaces that group records rather than naming a type.
pub const PAGES_NAMESPACE: &str = "Pages";
pub const ORDER_STEP_NAMESPACE: &str = "OrderStep";
pub const CHECKOUT_NAMESPACE: &str = "CheckoutPage_Controller";
pub const TEMPLATES_NAMESPACE: &str = "Templates";

/// One configuration value contributed by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvidedEntry {
    pub key: ConfigKey,
    pub description: Option<String>,
    pub value: Value,
    pub default: Option<Value>,
    pub provenance: Provenance,
}

impl ProvidedEntry {
    pub fn new(key: ConfigKey, value: Value, provenance: Provenance) -> Self {
        Self {
            key,
            description: None,
            value,
            default: None,
            provenance,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// A source of configuration values.
pub trait SourceProvider {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn provide(&self, ctx: &mut RunContext) -> AuditResult<Vec<ProvidedEntry>>;
}

/// Single-record configuration stores.
pub trait RecordStore {
    fn current_record(&self, store: &str) -> AuditResult<Option<StoreRecord>>;
}

impl RecordStore for Database {
    fn current_record(&self, store: &str) -> AuditResult<Option<StoreRecord>> {
        self.current_store_record(store).map_err(AuditError::database)
    }
}

impl InstanceSource for Database {
    fn list_instances(&self, kind: InstanceKind) -> AuditResult<Vec<RecordInstance>> {
        Database::list_instances(self, kind).map_err(AuditError::database)
    }
}

/// Static configuration files, deep-merged in order.
pub struct StaticFilesProvider {
    files: Vec<PathBuf>,
}

impl StaticFilesProvider {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }
}

impl SourceProvider for StaticFilesProvider {
    fn name(&self) -> &str {
        "static-files"
    }

    fn provide(&self, ctx: &mut RunContext) -> AuditResult<Vec<ProvidedEntry>> {
        let paths: Vec<&std::path::Path> = self.files.iter().map(PathBuf::as_path).collect();
        let table = read_merged_tables(&paths)?;
        for path in &paths {
            ctx.note_file_used(path);
        }

        let mut entries = Vec::new();
        for (namespace, fields) in table {
            ctx.note_namespace(&namespace);
            let Value::Object(fields) = fields else {
                continue;
            };
            for (field, value) in fields {
                entries.push(ProvidedEntry::new(
                    ConfigKey::new(&namespace, field),
                    value,
                    Provenance::StaticOverride,
                ));
            }
        }
        Ok(entries)
    }
}

/// Current records of single-record stores; each store is a namespace.
pub struct RecordStoreProvider<S> {
    source: S,
    stores: Vec<String>,
    excluded_fields: Vec<String>,
}

impl<S: RecordStore> RecordStoreProvider<S> {
    pub fn new(source: S, stores: Vec<String>, excluded_fields: Vec<String>) -> Self {
        Self {
            source,
            stores,
            excluded_fields,
        }
    }
}

impl<S: RecordStore> SourceProvider for RecordStoreProvider<S> {
    fn name(&self) -> &str {
        "record-stores"
    }

    fn provide(&self, ctx: &mut RunContext) -> AuditResult<Vec<ProvidedEntry>> {
        let mut entries = Vec::new();
        for store in &self.stores {
            let record = self.source.current_record(store)?.ok_or_else(|| {
                AuditError::source_unavailable(store, "no current record in the database")
            })?;
            ctx.catalog.register_namespace(store);

            let labels = record.field_labels();
            for (field, value) in record.current_values() {
                if self.excluded_fields.contains(&field) {
                    continue;
                }
                let label = labels.get(&field).map_or(field.as_str(), String::as_str);
                let description = format!(
                    "{}. Edit in the CMS: {} record #{}",
                    label, store, record.record_id
                );
                let default = record
                    .default_of(&field)
                    .cloned()
                    .unwrap_or_else(|| Value::String(NO_DEFAULT_SET.to_string()));
                entries.push(
                    ProvidedEntry::new(ConfigKey::new(store, &field), value, Provenance::Database)
                        .with_description(description)
                        .with_default(default),
                );
            }
        }
        Ok(entries)
    }
}

/// Settings that live outside configuration files and the database.
pub struct OtherSettingsProvider {
    settings: Vec<OtherSetting>,
}

impl OtherSettingsProvider {
    pub fn new(settings: Vec<OtherSetting>) -> Self {
        Self { settings }
    }
}

impl SourceProvider for OtherSettingsProvider {
    fn name(&self) -> &str {
        "other-settings"
    }

    fn provide(&self, _ctx: &mut RunContext) -> AuditResult<Vec<ProvidedEntry>> {
        Ok(self
            .settings
            .iter()
            .map(|setting| {
                let from_env = setting
                    .env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
                    .map(Value::String);
                let value = from_env
                    .or_else(|| setting.value.clone())
                    .unwrap_or(Value::Null);
                let description = match &setting.env {
                    Some(var) => format!(
                        "{} Set with the {} environment variable.",
                        setting.description, var
                    ),
                    None => setting.description.clone(),
                };
                ProvidedEntry::new(
                    ConfigKey::new(&setting.namespace, &setting.field),
                    value,
                    Provenance::Other,
                )
                .with_description(description)
                .with_default(Value::String(NO_DEFAULT_SET.to_string()))
            })
            .collect())
    }
}

/// The first page of each configured page type.
pub struct PagesProvider<S> {
    source: S,
    /// Page class names with their required flag.
    pages: Vec<(String, bool)>,
}

impl<S: InstanceSource> PagesProvider<S> {
    pub fn new(source: S, pages: Vec<(String, bool)>) -> Self {
        Self { source, pages }
    }
}

impl<S: InstanceSource> SourceProvider for PagesProvider<S> {
    fn name(&self) -> &str {
        "pages"
    }

    fn provide(&self, ctx: &mut RunContext) -> AuditResult<Vec<ProvidedEntry>> {
        ctx.catalog.register_namespace(PAGES_NAMESPACE);
        let pages = ctx.instances(&self.source, InstanceKind::Page)?.to_vec();

        let mut entries = Vec::new();
        for (class_name, required) in &self.pages {
            let necessity = if *required {
                "This page is required."
            } else {
                "This page is optional."
            };
            let key = ConfigKey::new(PAGES_NAMESPACE, class_name);

            // Exact class match: subclasses are pages of their own type.
            match pages.iter().find(|p| &p.class_name == class_name) {
                Some(page) => {
                    entries.push(
                        ProvidedEntry::new(
                            key,
                            Value::Object(page.config_values()),
                            Provenance::Database,
                        )
                        .with_description(format!(
                            "{} page \"{}\". {} Edit in the CMS: page #{}",
                            class_name, page.title, necessity, page.id
                        ))
                        .with_default(Value::Object(page.defaults_with_gaps())),
                    );
                }
                None if *required => {
                    entries.push(
                        ProvidedEntry::new(
                            key,
                            Value::String("[not created]".to_string()),
                            Provenance::Database,
                        )
                        .with_description(format!(
                            "{} page. {} Create one in the CMS.",
                            class_name, necessity
                        ))
                        .with_default(Value::String(
                            "[add page first to see defaults]".to_string(),
                        )),
                    );
                }
                None => debug!("Optional page {} not present", class_name),
            }
        }
        Ok(entries)
    }
}

/// Order workflow steps, keyed by step code.
pub struct OrderStepsProvider<S> {
    source: S,
}

impl<S: InstanceSource> OrderStepsProvider<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: InstanceSource> SourceProvider for OrderStepsProvider<S> {
    fn name(&self) -> &str {
        "order-steps"
    }

    fn provide(&self, ctx: &mut RunContext) -> AuditResult<Vec<ProvidedEntry>> {
        ctx.catalog.register_namespace(ORDER_STEP_NAMESPACE);
        let steps = ctx.instances(&self.source, InstanceKind::OrderStep)?;
        Ok(steps
            .iter()
            .map(|step| {
                record_entry(
                    ConfigKey::new(ORDER_STEP_NAMESPACE, &step.code),
                    step,
                    format!("{} Edit in the CMS: order step #{}", step.description, step.id),
                )
            })
            .collect())
    }
}

/// Checkout steps and order modifier descriptors shown on the checkout page.
pub struct CheckoutStepsProvider<S> {
    source: S,
}

impl<S: InstanceSource> CheckoutStepsProvider<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: InstanceSource> SourceProvider for CheckoutStepsProvider<S> {
    fn name(&self) -> &str {
        "checkout-steps"
    }

    fn provide(&self, ctx: &mut RunContext) -> AuditResult<Vec<ProvidedEntry>> {
        ctx.catalog.register_namespace(CHECKOUT_NAMESPACE);
        let steps = ctx
            .instances(&self.source, InstanceKind::CheckoutStep)?
            .to_vec();
        let descriptors = ctx
            .instances(&self.source, InstanceKind::ModifierDescriptor)?
            .to_vec();
        if steps.is_empty() && descriptors.is_empty() {
            return Ok(Vec::new());
        }

        let checkout_page_id = ctx
            .instances(&self.source, InstanceKind::Page)?
            .iter()
            .find(|p| p.class_name == CHECKOUT_PAGE)
            .map(|p| p.id)
            .ok_or_else(|| {
                AuditError::source_unavailable(CHECKOUT_PAGE, "no checkout page exists")
            })?;

        let mut entries = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            let field = format!("STEP_{}_{}", index + 1, step.code);
            entries.push(record_entry(
                ConfigKey::new(CHECKOUT_NAMESPACE, field),
                step,
                format!(
                    "{} Edit in the CMS: checkout page #{}",
                    step.description, checkout_page_id
                ),
            ));
        }
        for descriptor in &descriptors {
            let field = format!("OrderModifier_Descriptor_{}", descriptor.code);
            entries.push(record_entry(
                ConfigKey::new(CHECKOUT_NAMESPACE, field),
                descriptor,
                format!(
                    "{} Edit in the CMS: checkout page #{}",
                    descriptor.description, checkout_page_id
                ),
            ));
        }
        Ok(entries)
    }
}

/// Entry for a record whose class fields form the value.
fn record_entry(key: ConfigKey, record: &RecordInstance, description: String) -> ProvidedEntry {
    ProvidedEntry::new(
        key,
        Value::Object(record.config_values()),
        Provenance::Database,
    )
    .with_description(description)
    .with_default(Value::Object(record.defaults_with_gaps()))
}

/// Template bindings whose output is computed per request.
pub struct TemplateBindingsProvider {
    bindings: IndexMap<String, TemplateBinding>,
}

impl TemplateBindingsProvider {
    pub fn new(bindings: IndexMap<String, TemplateBinding>) -> Self {
        Self { bindings }
    }
}

/// Attribute a template binding is meant to be placed in.
pub fn binding_selector(method: &str) -> &'static str {
    if method.contains("ClassName") {
        "classname"
    } else {
        "id"
    }
}

/// Render a binding pattern for a placeholder requestor.
pub fn render_binding(pattern: &str) -> String {
    pattern
        .replace("{id}", "[ID]")
        .replace("{class_name}", "[CLASSNAME]")
}

impl SourceProvider for TemplateBindingsProvider {
    fn name(&self) -> &str {
        "template-bindings"
    }

    fn provide(&self, ctx: &mut RunContext) -> AuditResult<Vec<ProvidedEntry>> {
        ctx.catalog.register_namespace(TEMPLATES_NAMESPACE);
        Ok(self
            .bindings
            .iter()
            .map(|(method, binding)| {
                let description = format!(
                    "Use as <div {}=\"$AJAXDefinitions.{}\"></div>; AJAX then fills it with: {}",
                    binding_selector(method),
                    method,
                    binding.description
                );
                ProvidedEntry::new(
                    ConfigKey::new(TEMPLATES_NAMESPACE, format!("AJAXDefinitions_{}", method)),
                    Value::String(render_binding(&binding.pattern)),
                    Provenance::Computed,
                )
                .with_description(description)
                .with_default(Value::String(String::new()))
            })
            .collect())
    }
}
