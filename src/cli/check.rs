//! Check subcommand: run a reconciliation and print the report.

use clap::Args;

/// Arguments for the check subcommand
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Output format: text (default), json, or summary
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    pub format: ReportFormat,

    /// Only report on specific namespaces (comma-separated)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub namespaces: Option<Vec<String>>,

    /// Show only entries that need attention
    #[arg(long)]
    pub only_issues: bool,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Summary,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "summary" => Ok(ReportFormat::Summary),
            _ => Err(format!(
                "Invalid format '{}'. Valid options: text, json, summary",
                s
            )),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Summary => write!(f, "summary"),
        }
    }
}
