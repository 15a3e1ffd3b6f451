//! Human-readable report rendering.

use super::Report;
use crate::types::{Classification, ReconciliationEntry};
use std::fmt;

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Configuration report ({})",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f, "{}", "=".repeat(60))?;

        if !self.files_used.is_empty() {
            writeln!(f, "Files used:")?;
            for path in &self.files_used {
                writeln!(f, "  {}", path.display())?;
            }
        }

        let mut current: Option<&str> = None;
        for entry in &self.entries {
            if current != Some(entry.namespace.as_str()) {
                current = Some(entry.namespace.as_str());
                writeln!(f)?;
                writeln!(f, "Namespace: {}", entry.namespace)?;
                writeln!(f, "{}", "-".repeat(40))?;
            }
            write_entry(f, entry)?;
        }

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings ({}):", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "  ! [{}] {}", warning.kind.as_str(), warning.message)?;
            }
        }

        writeln!(f)?;
        write!(f, "{}", SummaryView(self))
    }
}

fn write_entry(f: &mut fmt::Formatter<'_>, entry: &ReconciliationEntry) -> fmt::Result {
    match &entry.field {
        Some(field) => writeln!(f, "  [{}] {}", entry.classification, field)?,
        None => writeln!(
            f,
            "  [{}] {} (fields: {})",
            entry.classification,
            entry.namespace,
            entry.orphaned_fields.join(", ")
        )?,
    }

    if let Some(description) = &entry.description {
        writeln!(f, "      {}", description)?;
    }
    writeln!(
        f,
        "      live:    {} ({})",
        entry.live.normalized, entry.provenance
    )?;
    if let Some(default) = &entry.default {
        writeln!(f, "      default: {}", default.normalized)?;
    }
    if let Some(note) = entry.provenance.source_note() {
        writeln!(f, "      {}", note)?;
    }
    if let Some(check) = &entry.special_check {
        writeln!(f, "      {}", check)?;
    }
    for warning in &entry.warnings {
        writeln!(f, "      ! {}", warning)?;
    }
    Ok(())
}

/// Counts-only view of a report.
pub struct SummaryView<'a>(pub &'a Report);

impl fmt::Display for SummaryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = &self.0.counts;
        writeln!(f, "Summary: {} entries, {} issues", counts.total(), counts.issues())?;
        for classification in Classification::ALL {
            writeln!(
                f,
                "  {:<28}{}",
                classification.as_str(),
                counts.get(classification)
            )?;
        }
        writeln!(f, "  {:<28}{}", "warnings", self.0.warnings.len())
    }
}
