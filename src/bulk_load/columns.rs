//! Column dispatch table for product spreadsheets.

use serde::Serialize;

/// What a spreadsheet column feeds into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "handler", content = "arg")]
pub enum ColumnHandler {
    /// Product group, looked up by title.
    Parent,
    InternalItemId,
    Title,
    Content,
    MetaDescription,
    MenuTitle,
    /// Image filename.
    Image,
    /// Variation slot; 0 is the plain `Variation` column.
    Variation(usize),
    /// Stored under the column name.
    Field(String),
    Ignored,
}

impl ColumnHandler {
    /// Map one header to its handler.
    pub fn for_header(header: &str, max_variations: usize) -> Self {
        match header.trim() {
            "" => ColumnHandler::Ignored,
            "Category" | "ProductGroup" => ColumnHandler::Parent,
            "Product ID" | "ProductID" | "SKU" => ColumnHandler::InternalItemId,
            "Title" => ColumnHandler::Title,
            "Long Description" => ColumnHandler::Content,
            "Short Description" => ColumnHandler::MetaDescription,
            "Short Title" => ColumnHandler::MenuTitle,
            "Image" | "Photo" => ColumnHandler::Image,
            "Variation" => ColumnHandler::Variation(0),
            other => match variation_slot(other) {
                Some(slot) if slot <= max_variations => ColumnHandler::Variation(slot),
                Some(_) => ColumnHandler::Ignored,
                None => ColumnHandler::Field(other.to_string()),
            },
        }
    }
}

/// `VariationN` -> `N`.
fn variation_slot(header: &str) -> Option<usize> {
    let digits = header.strip_prefix("Variation")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Handlers for every column, resolved once from the header row.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnMap {
    handlers: Vec<ColumnHandler>,
    /// Problems found while resolving headers.
    pub warnings: Vec<String>,
}

impl ColumnMap {
    pub fn resolve<'h>(headers: impl IntoIterator<Item = &'h str>, max_variations: usize) -> Self {
        let mut handlers = Vec::new();
        let mut warnings = Vec::new();
        for header in headers {
            let handler = ColumnHandler::for_header(header, max_variations);
            if handler == ColumnHandler::Ignored
                && variation_slot(header.trim()).is_some_and(|slot| slot > max_variations)
            {
                warnings.push(format!(
                    "Column {} exceeds the limit of {} variation columns and is ignored",
                    header.trim(),
                    max_variations
                ));
            }
            handlers.push(handler);
        }
        Self { handlers, warnings }
    }

    /// Handler for a column index; extra cells in flexible rows are ignored.
    pub fn handler(&self, index: usize) -> &ColumnHandler {
        self.handlers.get(index).unwrap_or(&ColumnHandler::Ignored)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
