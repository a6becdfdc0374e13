//! Schema descriptors.
//!
//! A [`SchemaFile`] describes one logical table: every field carries one type
//! string per backend plus a generation rule. [`SchemaFile::schema_for`]
//! projects it to the concrete [`Schema`] a single backend is driven with, so
//! all backends of a run share the same field names and differ only in types.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backends::BackendKind;
use crate::error::{Error, Result};

/// A single column: field name and backend-specific type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// Ordered field-name to type mapping for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Build a schema, rejecting empty schemas and duplicate field names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Config("schema has no fields".to_string()));
        }
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate field '{}' in schema",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Build a schema from `(name, type)` pairs.
    pub fn from_pairs<N, T>(pairs: impl IntoIterator<Item = (N, T)>) -> Result<Self>
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, sql_type)| Column::new(name, sql_type))
                .collect(),
        )
    }

    /// Columns in declared order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Field names sorted lexicographically.
    pub fn sorted_field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Generation rule for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldGenerator {
    /// Uniform integer in `[min, max]`.
    Int { min: i64, max: i64 },
    /// Random `[0-9a-z]` string with length in `[min_length, max_length]`.
    String { min_length: usize, max_length: usize },
}

impl FieldGenerator {
    fn validate(&self, field: &str) -> Result<()> {
        let empty = match self {
            FieldGenerator::Int { min, max } => min > max,
            FieldGenerator::String {
                min_length,
                max_length,
            } => min_length > max_length,
        };
        if empty {
            return Err(Error::Config(format!(
                "field '{}' has an empty generation range",
                field
            )));
        }
        Ok(())
    }
}

/// One field of the schema description file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// Backend name to type string.
    pub types: BTreeMap<String, String>,
    pub generator: FieldGenerator,
}

/// Logical schema shared by every backend of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaFile {
    fields: Vec<FieldSpec>,
}

impl SchemaFile {
    /// Validate and wrap a list of field descriptors.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::Config("schema has no fields".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate field '{}' in schema",
                    field.name
                )));
            }
            field.generator.validate(&field.name)?;
            let mut kinds = HashSet::new();
            for backend in field.types.keys() {
                if !kinds.insert(backend.parse::<BackendKind>()?) {
                    return Err(Error::Config(format!(
                        "field '{}' lists backend '{}' more than once",
                        field.name, backend
                    )));
                }
            }
        }

        Ok(Self { fields })
    }

    /// Parse a schema description from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let fields: Vec<FieldSpec> = serde_json::from_str(text)?;
        Self::new(fields)
    }

    /// Load a schema description file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Project the logical schema onto one backend's type system.
    pub fn schema_for(&self, kind: BackendKind) -> Result<Schema> {
        let columns = self
            .fields
            .iter()
            .map(|field| {
                field
                    .types
                    .iter()
                    .find(|(backend, _)| backend.parse::<BackendKind>().ok() == Some(kind))
                    .map(|(_, sql_type)| Column::new(&field.name, sql_type))
                    .ok_or_else(|| {
                        Error::Config(format!(
                            "field '{}' has no type for backend '{}'",
                            field.name, kind
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Schema::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"[
        {"name": "id", "types": {"mysql": "INT", "postgresql": "integer"},
         "generator": {"type": "int", "min": 0, "max": 100}},
        {"name": "name", "types": {"mysql": "CHAR(3)", "pg": "char(3)"},
         "generator": {"type": "string", "min_length": 3, "max_length": 3}}
    ]"#;

    #[test]
    fn test_schema_for_backend() {
        let file = SchemaFile::from_json(SCHEMA).unwrap();

        let mysql = file.schema_for(BackendKind::MySql).unwrap();
        assert_eq!(
            mysql.columns(),
            &[Column::new("id", "INT"), Column::new("name", "CHAR(3)")]
        );

        // "pg" is an alias for postgresql
        let pg = file.schema_for(BackendKind::Postgres).unwrap();
        assert_eq!(pg.columns()[1], Column::new("name", "char(3)"));
    }

    #[test]
    fn test_missing_backend_type() {
        let file = SchemaFile::from_json(SCHEMA).unwrap();
        let err = file.schema_for(BackendKind::ClickHouse).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_generator_parsing() {
        let file = SchemaFile::from_json(SCHEMA).unwrap();
        assert_eq!(
            file.fields()[0].generator,
            FieldGenerator::Int { min: 0, max: 100 }
        );
        assert_eq!(
            file.fields()[1].generator,
            FieldGenerator::String {
                min_length: 3,
                max_length: 3
            }
        );
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Schema::from_pairs([("a", "INT"), ("a", "TEXT")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_range_rejected() {
        let text = r#"[{"name": "n", "types": {"mysql": "INT"},
                        "generator": {"type": "int", "min": 5, "max": 1}}]"#;
        assert!(SchemaFile::from_json(text).is_err());
    }

    #[test]
    fn test_unknown_backend_in_types() {
        let text = r#"[{"name": "n", "types": {"oracle": "NUMBER"},
                        "generator": {"type": "int", "min": 0, "max": 1}}]"#;
        let err = SchemaFile::from_json(text).unwrap_err();
        assert!(matches!(err, Error::UnknownBackend(name) if name == "oracle"));
    }

    #[test]
    fn test_backend_alias_listed_twice() {
        let text = r#"[{"name": "n", "types": {"pg": "integer", "postgresql": "bigint"},
                        "generator": {"type": "int", "min": 0, "max": 1}}]"#;
        let err = SchemaFile::from_json(text).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("more than once")));
    }

    #[test]
    fn test_sorted_field_names() {
        let schema = Schema::from_pairs([("b", "INT"), ("C", "INT"), ("a", "INT")]).unwrap();
        assert_eq!(schema.sorted_field_names(), vec!["C", "a", "b"]);
    }
}
