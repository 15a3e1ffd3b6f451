//! Import subcommand: bulk load products from a CSV spreadsheet.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the import subcommand
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to the CSV file to load
    #[arg(value_name = "CSV")]
    pub file: PathBuf,

    /// Run the load without saving anything
    ///
    /// Every row is processed against the database inside a transaction
    /// that is rolled back afterwards, so the results show exactly what a
    /// real load would do.
    #[arg(long)]
    pub preview: bool,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    pub format: ImportFormat,
}

/// Output format for import results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for ImportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ImportFormat::Text),
            "json" => Ok(ImportFormat::Json),
            _ => Err(format!("Invalid format '{}'. Valid options: text, json", s)),
        }
    }
}

impl ImportArgs {
    /// Describe the import mode for logging
    pub fn import_mode(&self) -> &'static str {
        if self.preview { "preview" } else { "load" }
    }
}
