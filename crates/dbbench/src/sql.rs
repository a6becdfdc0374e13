//! SQL text rendering shared by all backends.
//!
//! Statements are assembled as plain strings so the exact bytes sent to each
//! backend are easy to audit and identical across backends. Values are NOT
//! escaped: records are synthetic benchmark data, never untrusted input.
//! Backends adjust the rendered text with the small patch helpers at the
//! bottom of this module instead of rendering their own DDL.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::value::{Record, Value};

/// Placeholder substituted with the run's table name in query templates.
pub const TABLE_NAME_PLACEHOLDER: &str = "{table_name}";

fn qualified(table: &str, db: Option<&str>) -> String {
    match db {
        Some(db) => format!("{}.{}", db, table),
        None => table.to_string(),
    }
}

/// `CREATE TABLE [db.]table (f1 t1, f2 t2, ...)` in declared field order.
pub fn create_table(table: &str, schema: &Schema, db: Option<&str>) -> String {
    let columns = schema
        .columns()
        .iter()
        .map(|c| format!("{} {}", c.name, c.sql_type))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE {} ({})", qualified(table, db), columns)
}

/// Multi-row `INSERT INTO [db.]table (f1,f2,...) VALUES (...),(...)`.
///
/// Fields are listed in lexicographic order so values line up with the
/// column list whatever order the record map yields. Every record must hold
/// exactly the schema's fields.
pub fn insert(
    table: &str,
    schema: &Schema,
    records: &[Record],
    db: Option<&str>,
) -> Result<String> {
    if records.is_empty() {
        return Err(Error::MalformedRecord("empty batch".to_string()));
    }

    let fields = schema.sorted_field_names();
    let mut values = Vec::with_capacity(records.len());

    for record in records {
        let row = fields
            .iter()
            .map(|field| {
                record
                    .get(*field)
                    .map(literal)
                    .ok_or_else(|| Error::MalformedRecord(format!("missing field '{}'", field)))
            })
            .collect::<Result<Vec<_>>>()?;

        if record.len() != fields.len() {
            if let Some(extra) = record.keys().find(|k| !schema.contains(k)) {
                return Err(Error::MalformedRecord(format!("unknown field '{}'", extra)));
            }
        }

        values.push(format!("({})", row.join(",")));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified(table, db),
        fields.join(","),
        values.join(",")
    ))
}

/// `DROP TABLE IF EXISTS [db.]table`.
pub fn drop_table(table: &str, db: Option<&str>) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified(table, db))
}

/// SQL literal for a value: text is single-quoted, numbers are bare.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Text(s) => format!("'{}'", s),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Null => "NULL".to_string(),
    }
}

/// Append a trailing clause, e.g. a storage engine.
pub fn append_clause(statement: &str, clause: &str) -> String {
    format!("{} {}", statement, clause)
}

/// Add `PRIMARY KEY (key)` as the last element of a CREATE TABLE column list.
pub fn inject_primary_key(create: &str, key: &str) -> String {
    match create.rfind(')') {
        Some(pos) => format!(
            "{}, PRIMARY KEY ({}){}",
            &create[..pos],
            key,
            &create[pos..]
        ),
        None => create.to_string(),
    }
}

/// Remove the `IF EXISTS` guard for dialects that do not support it.
pub fn strip_if_exists(drop: &str) -> String {
    drop.replacen("IF EXISTS ", "", 1)
}

/// A select statement with a `{table_name}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryTemplate(String);

impl QueryTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute every placeholder with `table`.
    pub fn render(&self, table: &str) -> String {
        self.0.replace(TABLE_NAME_PLACEHOLDER, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_pairs([("name", "CHAR(3)"), ("id", "INT")]).unwrap()
    }

    fn record(id: i64, name: &str) -> Record {
        let mut record = Record::new();
        record.insert("name".to_string(), Value::from(name));
        record.insert("id".to_string(), Value::from(id));
        record
    }

    #[test]
    fn test_create_table() {
        assert_eq!(
            create_table("test_ab12c", &schema(), None),
            "CREATE TABLE test_ab12c (name CHAR(3), id INT)"
        );
        assert_eq!(
            create_table("t", &schema(), Some("bench")),
            "CREATE TABLE bench.t (name CHAR(3), id INT)"
        );
    }

    #[test]
    fn test_insert_sorted_fields() {
        let sql = insert("t", &schema(), &[record(1, "abc"), record(2, "xyz")], None).unwrap();
        assert_eq!(sql, "INSERT INTO t (id,name) VALUES (1,'abc'),(2,'xyz')");
    }

    #[test]
    fn test_insert_with_prefix() {
        let sql = insert("t", &schema(), &[record(5, "q")], Some("db")).unwrap();
        assert_eq!(sql, "INSERT INTO db.t (id,name) VALUES (5,'q')");
    }

    #[test]
    fn test_insert_missing_field() {
        let mut bad = record(1, "abc");
        bad.remove("name");
        let err = insert("t", &schema(), &[record(2, "ok"), bad], None).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(msg) if msg.contains("name")));
    }

    #[test]
    fn test_insert_extra_field() {
        let mut bad = record(1, "abc");
        bad.insert("zzz".to_string(), Value::Int(0));
        let err = insert("t", &schema(), &[bad], None).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(msg) if msg.contains("zzz")));
    }

    #[test]
    fn test_insert_empty_batch() {
        assert!(insert("t", &schema(), &[], None).is_err());
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(drop_table("t", None), "DROP TABLE IF EXISTS t");
        assert_eq!(drop_table("t", Some("db")), "DROP TABLE IF EXISTS db.t");
    }

    #[test]
    fn test_literals_are_not_escaped() {
        assert_eq!(literal(&Value::from("it's")), "'it's'");
        assert_eq!(literal(&Value::Int(-3)), "-3");
        assert_eq!(literal(&Value::Null), "NULL");
    }

    #[test]
    fn test_dialect_patches() {
        let create = create_table("t", &schema(), None);
        assert_eq!(
            inject_primary_key(&create, "id"),
            "CREATE TABLE t (name CHAR(3), id INT, PRIMARY KEY (id))"
        );
        assert_eq!(
            append_clause(&create, "ENGINE = Log()"),
            "CREATE TABLE t (name CHAR(3), id INT) ENGINE = Log()"
        );
        assert_eq!(strip_if_exists(&drop_table("t", None)), "DROP TABLE t");
    }

    #[test]
    fn test_template_substitution() {
        let template = QueryTemplate::new("SELECT * FROM {table_name}");
        assert_eq!(template.render("test_ab12c"), "SELECT * FROM test_ab12c");

        let join = QueryTemplate::new(
            "SELECT a.id FROM {table_name} a JOIN {table_name} b ON a.id = b.id",
        );
        assert_eq!(
            join.render("t1"),
            "SELECT a.id FROM t1 a JOIN t1 b ON a.id = b.id"
        );
    }
}
