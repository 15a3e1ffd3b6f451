//! Source collection.
//!
//! Gathers the three tables the reconciler compares: definitions (field
//! descriptions), live configs and baseline defaults. Static files are read
//! first, then each registered provider contributes entries in priority
//! order. Later providers overwrite earlier ones key by key.

mod bootstrap;
mod context;
mod files;
mod providers;

pub use bootstrap::{BootstrapOutcome, bootstrap_local_copy};
pub use context::{InstanceSource, RunContext, TypeCatalog};
pub use files::{read_merged_tables, read_table};
pub use providers::{
    CHECKOUT_NAMESPACE, CHECKOUT_PAGE, CheckoutStepsProvider, ORDER_STEP_NAMESPACE,
    OrderStepsProvider, OtherSettingsProvider, PAGES_NAMESPACE, PagesProvider, ProvidedEntry,
    RecordStore, RecordStoreProvider, SourceProvider, StaticFilesProvider, TEMPLATES_NAMESPACE,
    TemplateBindingsProvider, binding_selector, render_binding,
};

use crate::config::Config;
use crate::db::Database;
use crate::error::AuditResult;
use crate::types::{ProvenanceTable, Table, insert_value};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// The three tables plus the provenance of every provided key.
#[derive(Debug, Clone, Default)]
pub struct CollectedSources {
    pub definitions: Table,
    pub configs: Table,
    pub defaults: Table,
    pub provenance: ProvenanceTable,
}

impl CollectedSources {
    /// Make a configured namespace visible even when it has no fields.
    pub fn declare_namespace(&mut self, namespace: &str) {
        if !self.configs.contains_key(namespace) {
            self.configs.insert(
                namespace.to_string(),
                serde_json::Value::Object(Default::default()),
            );
        }
    }

    /// Merge one provided entry, last write wins.
    pub fn apply(&mut self, entry: ProvidedEntry) {
        insert_value(&mut self.configs, &entry.key, entry.value);
        if let Some(description) = entry.description {
            insert_value(
                &mut self.definitions,
                &entry.key,
                serde_json::Value::String(description),
            );
        }
        if let Some(default) = entry.default {
            insert_value(&mut self.defaults, &entry.key, default);
        }
        self.provenance.record(entry.key, entry.provenance);
    }
}

/// Collects sources from files and registered providers.
pub struct SourceCollector<'a> {
    definitions_path: PathBuf,
    baseline_path: PathBuf,
    local_config_path: PathBuf,
    providers: Vec<Box<dyn SourceProvider + 'a>>,
}

impl<'a> SourceCollector<'a> {
    pub fn new(
        definitions_path: impl Into<PathBuf>,
        baseline_path: impl Into<PathBuf>,
        local_config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            definitions_path: definitions_path.into(),
            baseline_path: baseline_path.into(),
            local_config_path: local_config_path.into(),
            providers: Vec::new(),
        }
    }

    /// Append a provider; it runs after every provider registered before it.
    pub fn register(&mut self, provider: impl SourceProvider + 'a) -> &mut Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Collector with the standard providers in priority order.
    ///
    /// Database-backed providers are only registered when a database is given.
    pub fn from_config(config: &Config, db: Option<Database>) -> Self {
        let paths = &config.paths;
        let mut collector = Self::new(
            paths.definitions_path(),
            paths.baseline_path(),
            paths.local_config_path(),
        );

        let mut static_files = vec![paths.local_config_path()];
        static_files.extend(config.paths.config_files.iter().map(|p| paths.resolve(p)));
        collector.register(StaticFilesProvider::new(static_files));

        if let Some(db) = &db {
            collector.register(RecordStoreProvider::new(
                db.clone(),
                config.records.stores.clone(),
                config.records.excluded_fields.clone(),
            ));
        }

        collector.register(OtherSettingsProvider::new(config.other_settings.clone()));

        match db {
            Some(db) => {
                let pages = config
                    .pages
                    .all()
                    .map(|(name, required)| (name.to_string(), required))
                    .collect();
                collector.register(PagesProvider::new(db.clone(), pages));
                collector.register(OrderStepsProvider::new(db.clone()));
                collector.register(CheckoutStepsProvider::new(db));
            }
            None => debug!("No database configured; skipping record and page sources"),
        }

        collector.register(TemplateBindingsProvider::new(
            config.template_bindings.clone(),
        ));
        collector
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Bootstrap the local copy without collecting anything else.
    pub fn bootstrap(&self, ctx: &mut RunContext) -> AuditResult<BootstrapOutcome> {
        let outcome = bootstrap_local_copy(&self.baseline_path, &self.local_config_path)?;
        if outcome.created() {
            warn!(
                "Created a new local configuration file at {}; review and adjust it",
                outcome.path().display()
            );
        }
        ctx.set_bootstrap(outcome.clone());
        Ok(outcome)
    }

    /// Run the full collection.
    pub fn collect(&self, ctx: &mut RunContext) -> AuditResult<CollectedSources> {
        self.bootstrap(ctx)?;

        let mut sources = CollectedSources {
            definitions: read_table(&self.definitions_path)?,
            defaults: read_table(&self.baseline_path)?,
            ..Default::default()
        };
        ctx.note_file_used(&self.definitions_path);
        ctx.note_file_used(&self.baseline_path);
        info!(
            "Read {} definition and {} baseline namespaces",
            sources.definitions.len(),
            sources.defaults.len()
        );

        for provider in &self.providers {
            let entries = provider.provide(ctx)?;
            debug!("Provider {} supplied {} entries", provider.name(), entries.len());
            for namespace in ctx.take_namespaces() {
                sources.declare_namespace(&namespace);
            }
            for entry in entries {
                sources.apply(entry);
            }
        }

        info!(
            "Collected {} live namespaces from {} providers",
            sources.configs.len(),
            self.providers.len()
        );
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConfigKey, Provenance};
    use serde_json::{Value, json};

    struct Fixed(&'static str, Vec<ProvidedEntry>);

    impl SourceProvider for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn provide(&self, _ctx: &mut RunContext) -> AuditResult<Vec<ProvidedEntry>> {
            Ok(self.1.clone())
        }
    }

    #[test]
    fn test_apply_is_last_write_wins() {
        let key = ConfigKey::new("Email", "admin_email_address");
        let mut sources = CollectedSources::default();
        sources.apply(
            ProvidedEntry::new(key.clone(), json!("a@shop.test"), Provenance::StaticOverride)
                .with_description("Admin email"),
        );
        sources.apply(
            ProvidedEntry::new(key.clone(), json!("b@shop.test"), Provenance::Other)
                .with_default(json!("[no default set]")),
        );

        assert_eq!(sources.configs["Email"]["admin_email_address"], json!("b@shop.test"));
        // Descriptions without a replacement are kept.
        assert_eq!(
            sources.definitions["Email"]["admin_email_address"],
            json!("Admin email")
        );
        assert_eq!(
            sources.provenance.get("Email", "admin_email_address"),
            Some(Provenance::Other)
        );
    }

    #[test]
    fn test_declared_namespace_keeps_existing_fields() {
        let mut sources = CollectedSources::default();
        sources.apply(ProvidedEntry::new(
            ConfigKey::new("Cart", "enabled"),
            json!(true),
            Provenance::StaticOverride,
        ));
        sources.declare_namespace("Cart");
        sources.declare_namespace("Legacy");

        assert_eq!(sources.configs["Cart"]["enabled"], json!(true));
        assert_eq!(sources.configs["Legacy"], json!({}));
        assert!(sources.provenance.get("Legacy", "anything").is_none());
    }

    #[test]
    fn test_providers_run_in_registration_order() {
        let temp = tempfile::TempDir::new().unwrap();
        let defs = temp.path().join("defs.yaml");
        let base = temp.path().join("base.yaml");
        std::fs::write(&defs, "Cart:\n  enabled: Cart on\n").unwrap();
        std::fs::write(&base, "Cart:\n  enabled: true\n").unwrap();

        let key = ConfigKey::new("Cart", "enabled");
        let mut collector = SourceCollector::new(&defs, &base, temp.path().join("local.yaml"));
        collector
            .register(Fixed(
                "first",
                vec![ProvidedEntry::new(key.clone(), json!(false), Provenance::Database)],
            ))
            .register(Fixed(
                "second",
                vec![ProvidedEntry::new(key.clone(), json!(1), Provenance::Computed)],
            ));
        assert_eq!(collector.provider_names(), vec!["first", "second"]);

        let mut ctx = RunContext::new(temp.path());
        let sources = collector.collect(&mut ctx).unwrap();
        assert_eq!(sources.configs["Cart"]["enabled"], json!(1));
        assert_eq!(
            sources.provenance.get("Cart", "enabled"),
            Some(Provenance::Computed)
        );
        assert!(ctx.bootstrap().unwrap().created());
        assert_eq!(sources.defaults["Cart"]["enabled"], Value::Bool(true));
    }

    #[test]
    fn test_from_config_without_database() {
        let config = Config::default();
        let collector = SourceCollector::from_config(&config, None);
        assert_eq!(
            collector.provider_names(),
            vec!["static-files", "other-settings", "template-bindings"]
        );
    }

    #[test]
    fn test_from_config_with_database() {
        let config = Config::default();
        let db = Database::open_in_memory().unwrap();
        let collector = SourceCollector::from_config(&config, Some(db));
        assert_eq!(
            collector.provider_names(),
            vec![
                "static-files",
                "record-stores",
                "other-settings",
                "pages",
                "order-steps",
                "checkout-steps",
                "template-bindings"
            ]
        );
    }
}
