//! CLI command definitions for shop-config-audit
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod check;
pub mod import;

use check::CheckArgs;
use clap::{Parser, Subcommand};
use import::ImportArgs;

/// Store configuration audit and product bulk-load tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Directory relative paths resolve against (overrides config)
    #[arg(short, long, global = true)]
    pub base_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile the store configuration and print a report (default)
    Check(CheckArgs),

    /// Create the local configuration file from the shipped baseline
    Init,

    /// Bulk load products from a CSV spreadsheet
    Import(ImportArgs),
}
