//! Record stores and page/step record queries.

use super::Database;
use anyhow::Result;
use indexmap::IndexMap;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::types::DEFAULT_NOT_SET;

/// One field of a single-record configuration store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub label: String,
    pub value: Value,
    /// Declared default, if any.
    pub default: Option<Value>,
}

impl RecordField {
    pub fn new(name: impl Into<String>, label: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            value,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// The current record of a single-record configuration store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub store: String,
    pub record_id: i64,
    pub fields: Vec<RecordField>,
}

impl StoreRecord {
    /// Field -> value, in field order.
    pub fn current_values(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }

    /// Declared default of a field.
    pub fn default_of(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .and_then(|f| f.default.as_ref())
    }

    /// Field -> human-readable label, in field order.
    pub fn field_labels(&self) -> IndexMap<String, String> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.label.clone()))
            .collect()
    }
}

/// Kinds of records listed as instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    Page,
    OrderStep,
    CheckoutStep,
    ModifierDescriptor,
}

impl InstanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceKind::Page => "page",
            InstanceKind::OrderStep => "order_step",
            InstanceKind::CheckoutStep => "checkout_step",
            InstanceKind::ModifierDescriptor => "modifier_descriptor",
        }
    }
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page, order step, checkout step or modifier descriptor record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInstance {
    pub id: i64,
    pub kind: InstanceKind,
    pub class_name: String,
    /// Step code, or the modifier class for descriptors.
    pub code: String,
    pub title: String,
    pub description: String,
    pub sort: i64,
    /// Field -> declared type.
    pub class_fields: Map<String, Value>,
    pub declared_defaults: Map<String, Value>,
    pub values: Map<String, Value>,
}

impl RecordInstance {
    /// Direct field access by name. Unset fields read as null.
    pub fn field(&self, name: &str) -> Value {
        self.values.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Current value of every class field, in class field order.
    pub fn config_values(&self) -> Map<String, Value> {
        self.class_fields
            .keys()
            .map(|name| (name.clone(), self.field(name)))
            .collect()
    }

    /// Declared defaults, with every class field lacking one marked as unset.
    pub fn defaults_with_gaps(&self) -> Map<String, Value> {
        let mut defaults = self.declared_defaults.clone();
        for name in self.class_fields.keys() {
            if !defaults.contains_key(name) {
                defaults.insert(name.clone(), Value::String(DEFAULT_NOT_SET.to_string()));
            }
        }
        defaults
    }
}

/// Input for inserting a record instance.
#[derive(Debug, Clone, Default)]
pub struct NewInstance {
    pub class_name: String,
    pub code: String,
    pub title: String,
    pub description: String,
    pub sort: i64,
    pub class_fields: Map<String, Value>,
    pub declared_defaults: Map<String, Value>,
    pub values: Map<String, Value>,
}

/// Parse a JSON column; text that is not JSON reads as a plain string.
fn parse_json_column(text: Option<String>) -> Option<Value> {
    text.map(|s| serde_json::from_str(&s).unwrap_or(Value::String(s)))
}

fn parse_object_column(text: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn current_record_id(conn: &Connection, store: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT record_id FROM record_stores
             WHERE store = ?1
             ORDER BY use_this_one DESC, record_id DESC
             LIMIT 1",
            params![store],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

impl Database {
    /// Save a store record, replacing any previous fields of that record.
    pub fn save_store_record(
        &self,
        store: &str,
        record_id: i64,
        use_this_one: bool,
        fields: &[RecordField],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO record_stores (store, record_id, use_this_one) VALUES (?1, ?2, ?3)
                 ON CONFLICT(store, record_id) DO UPDATE SET use_this_one = excluded.use_this_one",
                params![store, record_id, use_this_one],
            )?;
            tx.execute(
                "DELETE FROM record_fields WHERE store = ?1 AND record_id = ?2",
                params![store, record_id],
            )?;
            for (position, field) in fields.iter().enumerate() {
                let value = serde_json::to_string(&field.value)?;
                let default = field
                    .default
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                tx.execute(
                    "INSERT INTO record_fields
                     (store, record_id, field, label, value, default_value, position)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        store,
                        record_id,
                        field.name,
                        field.label,
                        value,
                        default,
                        position as i64
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Get the current record of a store.
    ///
    /// The current record is the newest one flagged `use_this_one`, or the
    /// newest record when none is flagged.
    pub fn current_store_record(&self, store: &str) -> Result<Option<StoreRecord>> {
        self.with_conn(|conn| {
            let Some(record_id) = current_record_id(conn, store)? else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT field, label, value, default_value FROM record_fields
                 WHERE store = ?1 AND record_id = ?2
                 ORDER BY position, field",
            )?;
            let fields = stmt
                .query_map(params![store, record_id], |row| {
                    let name: String = row.get(0)?;
                    let label: String = row.get(1)?;
                    let value: Option<String> = row.get(2)?;
                    let default: Option<String> = row.get(3)?;
                    Ok((name, label, value, default))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?
                .into_iter()
                .map(|(name, label, value, default)| RecordField {
                    name,
                    label,
                    value: parse_json_column(value).unwrap_or(Value::Null),
                    default: parse_json_column(default),
                })
                .collect();

            Ok(Some(StoreRecord {
                store: store.to_string(),
                record_id,
                fields,
            }))
        })
    }

    /// Insert a record instance and return its id.
    pub fn insert_instance(&self, kind: InstanceKind, instance: &NewInstance) -> Result<i64> {
        let class_fields = serde_json::to_string(&instance.class_fields)?;
        let declared_defaults = serde_json::to_string(&instance.declared_defaults)?;
        let values = serde_json::to_string(&instance.values)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO record_instances
                 (kind, class_name, code, title, description, sort,
                  class_fields, declared_defaults, field_values)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    kind.as_str(),
                    instance.class_name,
                    instance.code,
                    instance.title,
                    instance.description,
                    instance.sort,
                    class_fields,
                    declared_defaults,
                    values
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// List record instances of one kind, in sort order.
    pub fn list_instances(&self, kind: InstanceKind) -> Result<Vec<RecordInstance>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, class_name, code, title, description, sort,
                        class_fields, declared_defaults, field_values
                 FROM record_instances
                 WHERE kind = ?1
                 ORDER BY sort, id",
            )?;

            let rows = stmt
                .query_map(params![kind.as_str()], |row| {
                    let class_fields: String = row.get(6)?;
                    let declared_defaults: String = row.get(7)?;
                    let values: String = row.get(8)?;
                    Ok(RecordInstance {
                        id: row.get(0)?,
                        kind,
                        class_name: row.get(1)?,
                        code: row.get(2)?,
                        title: row.get(3)?,
                        description: row.get(4)?,
                        sort: row.get(5)?,
                        class_fields: parse_object_column(&class_fields),
                        declared_defaults: parse_object_column(&declared_defaults),
                        values: parse_object_column(&values),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup_db() -> Database {
        Database::open_in_memory().expect("Failed to create in-memory database")
    }

    #[test]
    fn test_current_record_prefers_flagged() {
        let db = setup_db();
        db.save_store_record(
            "EcommerceDBConfig",
            1,
            true,
            &[RecordField::new("ShopClosed", "Shop Closed", json!(false))],
        )
        .unwrap();
        db.save_store_record(
            "EcommerceDBConfig",
            2,
            false,
            &[RecordField::new("ShopClosed", "Shop Closed", json!(true))],
        )
        .unwrap();

        let record = db.current_store_record("EcommerceDBConfig").unwrap().unwrap();
        assert_eq!(record.record_id, 1);
        assert_eq!(record.current_values()["ShopClosed"], json!(false));
    }

    #[test]
    fn test_missing_store_has_no_record() {
        let db = setup_db();
        assert!(db.current_store_record("Nope").unwrap().is_none());
    }

    #[test]
    fn test_record_fields_keep_order_and_defaults() {
        let db = setup_db();
        db.save_store_record(
            "EcommerceDBConfig",
            1,
            true,
            &[
                RecordField::new("Zeta", "Zeta label", json!("z")),
                RecordField::new("Alpha", "Alpha label", json!(3)).with_default(json!(5)),
            ],
        )
        .unwrap();

        let record = db.current_store_record("EcommerceDBConfig").unwrap().unwrap();
        let labels: Vec<String> = record.field_labels().keys().cloned().collect();
        assert_eq!(labels, vec!["Zeta", "Alpha"]);
        assert_eq!(record.fields[1].default, Some(json!(5)));
        assert_eq!(record.fields[0].default, None);
        assert_eq!(record.default_of("Alpha"), Some(&json!(5)));
        assert_eq!(record.default_of("Zeta"), None);
        assert_eq!(record.default_of("Missing"), None);
    }

    #[test]
    fn test_instances_listed_by_sort() {
        let db = setup_db();
        for (sort, code) in [(20, "PAID"), (10, "CREATED")] {
            db.insert_instance(
                InstanceKind::OrderStep,
                &NewInstance {
                    class_name: "OrderStep".to_string(),
                    code: code.to_string(),
                    sort,
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let steps = db.list_instances(InstanceKind::OrderStep).unwrap();
        let codes: Vec<&str> = steps.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["CREATED", "PAID"]);
        assert!(db.list_instances(InstanceKind::Page).unwrap().is_empty());
    }

    #[test]
    fn test_defaults_with_gaps_marks_unset_fields() {
        let instance = RecordInstance {
            id: 1,
            kind: InstanceKind::Page,
            class_name: "CheckoutPage".to_string(),
            code: String::new(),
            title: "Checkout".to_string(),
            description: String::new(),
            sort: 0,
            class_fields: json!({"TermsPageID": "Int", "InvitationToCompleteOrder": "HTMLText"})
                .as_object()
                .cloned()
                .unwrap(),
            declared_defaults: json!({"TermsPageID": 0}).as_object().cloned().unwrap(),
            values: json!({"TermsPageID": 7}).as_object().cloned().unwrap(),
        };

        let defaults = instance.defaults_with_gaps();
        assert_eq!(defaults["TermsPageID"], json!(0));
        assert_eq!(defaults["InvitationToCompleteOrder"], json!(DEFAULT_NOT_SET));

        let values = instance.config_values();
        assert_eq!(values["TermsPageID"], json!(7));
        assert_eq!(values["InvitationToCompleteOrder"], Value::Null);
    }
}
