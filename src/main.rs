//! shop-config-audit command-line entry point.

use anyhow::{Context, Result};
use clap::Parser;
use shop_config_audit::audit::{run_audit, run_bootstrap};
use shop_config_audit::bulk_load::BulkLoader;
use shop_config_audit::cli::check::{CheckArgs, ReportFormat};
use shop_config_audit::cli::import::{ImportArgs, ImportFormat};
use shop_config_audit::cli::{Cli, Command};
use shop_config_audit::collect::BootstrapOutcome;
use shop_config_audit::config::{Config, ConfigLoader};
use shop_config_audit::db::Database;
use shop_config_audit::logging::{self, LogTarget};
use shop_config_audit::report::SummaryView;
use std::path::PathBuf;
use tracing::{debug, info};

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::load_explicit(PathBuf::from(path))?,
        None => ConfigLoader::load()?,
    };
    for (tier, path) in loader.sources() {
        debug!("Configuration tier {}: {}", tier, path.display());
    }

    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.paths.database = Some(db_path.into());
    }
    if let Some(base_dir) = &cli.base_dir {
        config.paths.base_dir = base_dir.into();
    }

    match cli.command {
        Some(Command::Check(args)) => run_check(config, args),
        None => run_check(config, CheckArgs::default()),
        Some(Command::Init) => run_init(config),
        Some(Command::Import(args)) => run_import(config, args),
    }
}

fn open_database(config: &Config) -> Result<Option<Database>> {
    match config.paths.database_path() {
        Some(path) => {
            info!("Database: {}", path.display());
            let db = Database::open(&path)
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            Ok(Some(db))
        }
        None => Ok(None),
    }
}

fn run_check(config: &Config, args: CheckArgs) -> Result<()> {
    let db = open_database(config)?;
    let mut report = run_audit(config, db)?;

    if let Some(namespaces) = &args.namespaces {
        report.filter_namespaces(namespaces);
    }
    if args.only_issues {
        report.only_issues();
    }

    match args.format {
        ReportFormat::Text => print!("{}", report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Summary => print!("{}", SummaryView(&report)),
    }
    Ok(())
}

fn run_init(config: &Config) -> Result<()> {
    match run_bootstrap(config)? {
        BootstrapOutcome::Created { path } => {
            println!("Created local configuration file {}", path.display());
        }
        BootstrapOutcome::AlreadyPresent { path } => {
            println!("Local configuration file {} already exists", path.display());
        }
    }
    Ok(())
}

fn run_import(config: &Config, args: ImportArgs) -> Result<()> {
    let db = open_database(config)?
        .context("No database configured; pass --database or set paths.database")?;

    info!("Importing {} ({})", args.file.display(), args.import_mode());
    let loader = BulkLoader::new(config.import.clone());
    let summary = loader.load_file(&db, &args.file, args.preview)?;

    match args.format {
        ImportFormat::Text => print!("{}", summary),
        ImportFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}
