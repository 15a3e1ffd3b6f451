//! One full audit run: collect, reconcile, validate, report.

use crate::collect::{BootstrapOutcome, RunContext, SourceCollector, TypeCatalog};
use crate::config::Config;
use crate::db::Database;
use crate::error::AuditResult;
use crate::reconcile::reconcile;
use crate::report::Report;
use crate::validators::ValidatorRegistry;
use tracing::info;

fn run_context(config: &Config) -> RunContext {
    RunContext::new(config.paths.base_dir.clone())
        .with_catalog(TypeCatalog::from_config(&config.types))
}

/// Run an audit with the standard providers and configured validators.
pub fn run_audit(config: &Config, db: Option<Database>) -> AuditResult<Report> {
    let collector = SourceCollector::from_config(config, db);
    let validators = ValidatorRegistry::from_config(&config.validators);
    run_audit_with(config, &collector, &validators)
}

/// Run an audit with a caller-assembled collector and validator registry.
pub fn run_audit_with(
    config: &Config,
    collector: &SourceCollector<'_>,
    validators: &ValidatorRegistry,
) -> AuditResult<Report> {
    let mut ctx = run_context(config);
    let sources = collector.collect(&mut ctx)?;
    let mut entries = reconcile(
        &sources.definitions,
        &sources.configs,
        &sources.defaults,
        &sources.provenance,
    )?;
    let failures = validators.apply(&mut entries, &ctx);

    let report = Report::build(entries, &ctx, &failures);
    info!(
        "Audit finished: {} entries, {} issues, {} warnings",
        report.counts.total(),
        report.counts.issues(),
        report.warnings.len()
    );
    Ok(report)
}

/// Only create the local configuration copy.
pub fn run_bootstrap(config: &Config) -> AuditResult<BootstrapOutcome> {
    let collector = SourceCollector::from_config(config, None);
    collector.bootstrap(&mut run_context(config))
}
