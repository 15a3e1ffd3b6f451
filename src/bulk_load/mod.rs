//! Product bulk loading from CSV spreadsheets.
//!
//! Each data row becomes a product. Rows that match an existing product (by
//! internal item id, then by title) update it instead. Products left without
//! a group are placed under a fallback group. A preview runs the whole load
//! inside a transaction that is rolled back.

mod columns;
mod variations;

pub use columns::{ColumnHandler, ColumnMap};
pub use variations::{Variation, parse_variation};

use crate::config::ImportConfig;
use crate::db::Database;
use crate::db::products::{self, Product};
use crate::error::{AuditError, AuditResult};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// What happened to one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowResult {
    /// 1-based line number (header = 1).
    pub line: u64,
    pub action: RowAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    pub title: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

/// Outcome of a load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub preview: bool,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Header-level warnings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub rows: Vec<RowResult>,
}

impl ImportSummary {
    fn push(&mut self, row: RowResult) {
        match row.action {
            RowAction::Created => self.created += 1,
            RowAction::Updated => self.updated += 1,
            RowAction::Skipped => self.skipped += 1,
        }
        self.rows.push(row);
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.preview {
            writeln!(f, "Preview only: no changes were saved.")?;
        }
        for warning in &self.warnings {
            writeln!(f, "! {}", warning)?;
        }
        for row in &self.rows {
            let action = match row.action {
                RowAction::Created => "created",
                RowAction::Updated => "updated",
                RowAction::Skipped => "skipped",
            };
            writeln!(f, "line {:>4}: {:<8} {}", row.line, action, row.title)?;
            for message in &row.messages {
                writeln!(f, "           {}", message)?;
            }
        }
        writeln!(
            f,
            "Created: {}, updated: {}, skipped: {}",
            self.created, self.updated, self.skipped
        )
    }
}

/// A data row with its line number.
#[derive(Debug, Clone)]
struct CsvRow {
    line: u64,
    cells: Vec<String>,
}

/// Parsed spreadsheet: resolved columns, good rows and unreadable rows.
struct Spreadsheet {
    columns: ColumnMap,
    rows: Vec<CsvRow>,
    unreadable: Vec<(u64, String)>,
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

fn parse_spreadsheet(data: &[u8], max_variations: usize) -> AuditResult<Spreadsheet> {
    let data = strip_utf8_bom(data);
    if data.is_empty() {
        return Err(AuditError::import(1, "CSV file is empty"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| AuditError::import(1, format!("failed to read CSV headers: {}", e)))?
        .clone();
    let columns = ColumnMap::resolve(headers.iter(), max_variations);

    let mut rows = Vec::new();
    let mut unreadable = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index as u64 + 2;
        match record {
            Ok(record) => rows.push(CsvRow {
                line: record.position().map_or(line, |p| p.line()),
                cells: record.iter().map(str::to_string).collect(),
            }),
            Err(e) => unreadable.push((line, format!("Failed to parse CSV row: {}", e))),
        }
    }

    Ok(Spreadsheet {
        columns,
        rows,
        unreadable,
    })
}

/// Loads product spreadsheets into the catalog.
pub struct BulkLoader {
    config: ImportConfig,
}

/// State that lives for one load.
#[derive(Default)]
struct LoadRun {
    /// Fallback group found for an earlier row.
    cached_parent: Option<i64>,
}

impl BulkLoader {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    pub fn load_file(
        &self,
        db: &Database,
        path: &Path,
        preview: bool,
    ) -> AuditResult<ImportSummary> {
        let data = std::fs::read(path)
            .map_err(|e| AuditError::source_unavailable(&path.display().to_string(), e))?;
        self.load(db, &data, preview)
    }

    /// Load CSV bytes. With `preview`, nothing is persisted.
    pub fn load(&self, db: &Database, data: &[u8], preview: bool) -> AuditResult<ImportSummary> {
        let sheet = parse_spreadsheet(data, self.config.max_variation_columns)?;
        info!(
            "Loading {} product rows from {} columns{}",
            sheet.rows.len(),
            sheet.columns.len(),
            if preview { " (preview)" } else { "" }
        );

        let summary = db
            .with_conn_mut(|conn| {
                let tx = conn.transaction()?;
                let summary = self.process(&tx, &sheet, preview)?;
                if preview {
                    tx.rollback()?;
                } else {
                    tx.commit()?;
                }
                Ok(summary)
            })
            .map_err(AuditError::database)?;

        info!(
            "Products created: {}, updated: {}, skipped: {}",
            summary.created, summary.updated, summary.skipped
        );
        Ok(summary)
    }

    fn process(
        &self,
        conn: &Connection,
        sheet: &Spreadsheet,
        preview: bool,
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary {
            preview,
            warnings: sheet.columns.warnings.clone(),
            ..Default::default()
        };
        let mut run = LoadRun::default();

        for (line, message) in &sheet.unreadable {
            summary.push(RowResult {
                line: *line,
                action: RowAction::Skipped,
                product_id: None,
                title: String::new(),
                messages: vec![message.clone()],
            });
        }

        for row in &sheet.rows {
            let result = self.process_row(conn, &sheet.columns, row, &mut run)?;
            debug!("Line {}: {:?} {}", result.line, result.action, result.title);
            summary.push(result);
        }

        summary.rows.sort_by_key(|r| r.line);
        Ok(summary)
    }

    fn process_row(
        &self,
        conn: &Connection,
        columns: &ColumnMap,
        row: &CsvRow,
        run: &mut LoadRun,
    ) -> Result<RowResult> {
        let mut draft = Product::default();
        let mut group_name: Option<&str> = None;
        let mut variations = Vec::new();
        let mut messages = Vec::new();

        for (index, cell) in row.cells.iter().enumerate() {
            let value = cell.trim();
            if value.is_empty() {
                continue;
            }
            match columns.handler(index) {
                ColumnHandler::Parent => group_name = Some(value),
                ColumnHandler::InternalItemId => draft.internal_item_id = Some(value.to_string()),
                ColumnHandler::Title => draft.title = value.to_string(),
                ColumnHandler::Content => draft.content = Some(value.to_string()),
                ColumnHandler::MetaDescription => draft.meta_description = Some(value.to_string()),
                ColumnHandler::MenuTitle => draft.menu_title = Some(value.to_string()),
                ColumnHandler::Image => draft.image = Some(value.to_string()),
                ColumnHandler::Variation(slot) => match parse_variation(value) {
                    Some(variation) => variations.push(variation),
                    None => messages.push(format!(
                        "Variation column {} ignored: expected 'Type: value, value'",
                        slot
                    )),
                },
                ColumnHandler::Field(name) => {
                    draft
                        .extra_fields
                        .insert(name.clone(), Value::String(value.to_string()));
                }
                ColumnHandler::Ignored => {}
            }
        }

        if draft.title.is_empty() && draft.internal_item_id.is_none() {
            messages.push("Row has neither a title nor a product id".to_string());
            return Ok(RowResult {
                line: row.line,
                action: RowAction::Skipped,
                product_id: None,
                title: String::new(),
                messages,
            });
        }

        let existing = find_duplicate(conn, &draft)?;
        let mut product = match existing {
            Some(id) => {
                let mut current = products::get_product(conn, id)?.unwrap_or_default();
                current.id = id;
                merge_into(&mut current, draft);
                current
            }
            None => draft,
        };

        if let Some(name) = group_name {
            match self.resolve_named_group(conn, name, run)? {
                Some(id) => product.parent_id = id,
                None => messages.push(format!("Product group '{}' does not exist", name)),
            }
        }
        if product.parent_id == 0 {
            product.parent_id = self.fallback_parent(conn, run)?;
        }

        let action = match existing {
            Some(_) => {
                products::update_product(conn, &product)?;
                RowAction::Updated
            }
            None => {
                product.id = products::insert_product(conn, &product)?;
                RowAction::Created
            }
        };

        for variation in &variations {
            let type_id = products::find_or_make_attribute_type(conn, &variation.attribute_type)?;
            products::add_attribute_values(conn, type_id, &variation.values)?;
            products::link_variation_type(conn, product.id, type_id)?;
        }

        Ok(RowResult {
            line: row.line,
            action,
            product_id: Some(product.id),
            title: product.title,
            messages,
        })
    }

    /// Group named in a row, created on demand when allowed.
    fn resolve_named_group(
        &self,
        conn: &Connection,
        name: &str,
        run: &LoadRun,
    ) -> Result<Option<i64>> {
        if let Some(id) = products::find_group_by_title(conn, name)? {
            return Ok(Some(id));
        }
        if !self.config.create_missing_groups {
            return Ok(None);
        }
        let id = products::insert_group(conn, name, run.cached_parent.unwrap_or(0))?;
        debug!("Created product group '{}' (#{})", name, id);
        Ok(Some(id))
    }

    /// Cached group, then the default group, then a root group, then the
    /// newest group, then 0.
    fn fallback_parent(&self, conn: &Connection, run: &mut LoadRun) -> Result<i64> {
        if let Some(id) = run.cached_parent
            && products::group_exists(conn, id)?
        {
            return Ok(id);
        }

        let found = match products::find_group_by_title(conn, &self.config.default_group_title)? {
            Some(id) => Some(id),
            None => match products::find_root_group(conn)? {
                Some(id) => Some(id),
                None => products::find_newest_group(conn)?,
            },
        };
        let id = found.unwrap_or(0);
        run.cached_parent = Some(id);
        Ok(id)
    }
}

/// Existing product for a draft: by internal item id, then by title.
fn find_duplicate(conn: &Connection, draft: &Product) -> Result<Option<i64>> {
    if let Some(internal_id) = &draft.internal_item_id
        && let Some(id) = products::find_product_by_internal_id(conn, internal_id)?
    {
        return Ok(Some(id));
    }
    if draft.title.is_empty() {
        return Ok(None);
    }
    products::find_product_by_title(conn, &draft.title)
}

/// Overwrite `current` with every field the draft sets.
fn merge_into(current: &mut Product, draft: Product) {
    if draft.internal_item_id.is_some() {
        current.internal_item_id = draft.internal_item_id;
    }
    if !draft.title.is_empty() {
        current.title = draft.title;
    }
    for (target, value) in [
        (&mut current.content, draft.content),
        (&mut current.meta_description, draft.meta_description),
        (&mut current.menu_title, draft.menu_title),
        (&mut current.image, draft.image),
    ] {
        if value.is_some() {
            *target = value;
        }
    }
    current.extra_fields.extend(draft.extra_fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_is_stripped() {
        let sheet = parse_spreadsheet(b"\xEF\xBB\xBFTitle,SKU\nTeapot,T1\n", 6).unwrap();
        assert_eq!(sheet.columns.handler(0), &ColumnHandler::Title);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].line, 2);
    }

    #[test]
    fn test_empty_file_is_an_import_error() {
        let err = parse_spreadsheet(b"", 6).err().unwrap();
        assert_eq!(err.code, crate::error::ErrorCode::ImportError);
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut current = Product {
            id: 3,
            title: "Teapot".to_string(),
            content: Some("Old".to_string()),
            image: Some("teapot.jpg".to_string()),
            ..Default::default()
        };
        let draft = Product {
            content: Some("New".to_string()),
            ..Default::default()
        };
        merge_into(&mut current, draft);
        assert_eq!(current.title, "Teapot");
        assert_eq!(current.content.as_deref(), Some("New"));
        assert_eq!(current.image.as_deref(), Some("teapot.jpg"));
        assert_eq!(current.id, 3);
    }
}
