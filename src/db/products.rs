//! Product catalog storage used by the bulk loader.
//!
//! Write helpers take a plain `Connection` so a caller can run a whole load
//! inside one transaction and roll it back for previews.

use super::Database;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current timestamp in milliseconds.
fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A product group (category page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductGroup {
    pub id: i64,
    pub title: String,
    pub parent_id: i64,
}

/// A product row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub internal_item_id: Option<String>,
    pub title: String,
    pub parent_id: i64,
    pub content: Option<String>,
    pub meta_description: Option<String>,
    pub menu_title: Option<String>,
    pub image: Option<String>,
    /// Columns with no dedicated field.
    pub extra_fields: Map<String, Value>,
}

fn product_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    let extra: String = row.get(8)?;
    Ok(Product {
        id: row.get(0)?,
        internal_item_id: row.get(1)?,
        title: row.get(2)?,
        parent_id: row.get(3)?,
        content: row.get(4)?,
        meta_description: row.get(5)?,
        menu_title: row.get(6)?,
        image: row.get(7)?,
        extra_fields: match serde_json::from_str::<Value>(&extra) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
    })
}

const PRODUCT_COLUMNS: &str = "id, internal_item_id, title, parent_id, content, \
     meta_description, menu_title, image, extra_fields";

pub fn get_product(conn: &Connection, id: i64) -> Result<Option<Product>> {
    let product = conn
        .query_row(
            &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS),
            params![id],
            product_from_row,
        )
        .optional()?;
    Ok(product)
}

/// Newest product with the given internal item id.
pub fn find_product_by_internal_id(conn: &Connection, internal_id: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM products WHERE internal_item_id = ?1 ORDER BY id DESC LIMIT 1",
            params![internal_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Newest product with exactly the given title.
pub fn find_product_by_title(conn: &Connection, title: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM products WHERE title = ?1 ORDER BY id DESC LIMIT 1",
            params![title],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Insert a product and return its id. `product.id` is ignored.
pub fn insert_product(conn: &Connection, product: &Product) -> Result<i64> {
    let now = now_ms();
    conn.execute(
        "INSERT INTO products
         (internal_item_id, title, parent_id, content, meta_description, menu_title,
          image, extra_fields, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            product.internal_item_id,
            product.title,
            product.parent_id,
            product.content,
            product.meta_description,
            product.menu_title,
            product.image,
            serde_json::to_string(&product.extra_fields)?,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrite every field of an existing product.
pub fn update_product(conn: &Connection, product: &Product) -> Result<()> {
    conn.execute(
        "UPDATE products SET internal_item_id = ?2, title = ?3, parent_id = ?4,
             content = ?5, meta_description = ?6, menu_title = ?7, image = ?8,
             extra_fields = ?9, updated_at = ?10
         WHERE id = ?1",
        params![
            product.id,
            product.internal_item_id,
            product.title,
            product.parent_id,
            product.content,
            product.meta_description,
            product.menu_title,
            product.image,
            serde_json::to_string(&product.extra_fields)?,
            now_ms()
        ],
    )?;
    Ok(())
}

pub fn group_exists(conn: &Connection, id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM product_groups WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Newest group whose title matches, ignoring case.
pub fn find_group_by_title(conn: &Connection, title: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM product_groups WHERE LOWER(title) = LOWER(?1)
             ORDER BY created_at DESC, id DESC LIMIT 1",
            params![title],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Newest top-level group.
pub fn find_root_group(conn: &Connection) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM product_groups WHERE parent_id = 0
             ORDER BY created_at DESC, id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn find_newest_group(conn: &Connection) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM product_groups ORDER BY created_at DESC, id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn insert_group(conn: &Connection, title: &str, parent_id: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO product_groups (title, parent_id, created_at) VALUES (?1, ?2, ?3)",
        params![title, parent_id, now_ms()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Find an attribute type by name, creating it if needed.
pub fn find_or_make_attribute_type(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO attribute_types (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    let id = conn.query_row(
        "SELECT id FROM attribute_types WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Add values to an attribute type, skipping ones it already has.
pub fn add_attribute_values(conn: &Connection, type_id: i64, values: &[String]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO attribute_values (type_id, value) VALUES (?1, ?2)
         ON CONFLICT(type_id, value) DO NOTHING",
    )?;
    for value in values {
        stmt.execute(params![type_id, value])?;
    }
    Ok(())
}

pub fn link_variation_type(conn: &Connection, product_id: i64, type_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO product_variation_types (product_id, type_id) VALUES (?1, ?2)
         ON CONFLICT(product_id, type_id) DO NOTHING",
        params![product_id, type_id],
    )?;
    Ok(())
}

impl Database {
    pub fn list_products(&self) -> Result<Vec<Product>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM products ORDER BY id",
                PRODUCT_COLUMNS
            ))?;
            let products = stmt
                .query_map([], product_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(products)
        })
    }

    pub fn list_groups(&self) -> Result<Vec<ProductGroup>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, title, parent_id FROM product_groups ORDER BY id")?;
            let groups = stmt
                .query_map([], |row| {
                    Ok(ProductGroup {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        parent_id: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(groups)
        })
    }

    pub fn create_group(&self, title: &str, parent_id: i64) -> Result<i64> {
        self.with_conn(|conn| insert_group(conn, title, parent_id))
    }

    /// Variation type names of a product, with their values.
    pub fn product_variations(&self, product_id: i64) -> Result<Vec<(String, Vec<String>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.name FROM product_variation_types pv
                 JOIN attribute_types t ON t.id = pv.type_id
                 WHERE pv.product_id = ?1 ORDER BY t.id",
            )?;
            let types = stmt
                .query_map(params![product_id], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut values_stmt =
                conn.prepare("SELECT value FROM attribute_values WHERE type_id = ?1 ORDER BY id")?;
            let mut result = Vec::with_capacity(types.len());
            for (type_id, name) in types {
                let values = values_stmt
                    .query_map(params![type_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                result.push((name, values));
            }
            Ok(result)
        })
    }
}
