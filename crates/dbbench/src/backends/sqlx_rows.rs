//! Dynamic decoding of sqlx rows into [`Value`]s.
//!
//! sqlx decodes by static type, so each column is dispatched on its server
//! type name before decoding.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::{Column, Row as _, TypeInfo};

use crate::error::{Error, Result};
use crate::value::{Row, Value};

fn decimal(d: Option<Decimal>) -> Value {
    match d {
        Some(d) => d
            .to_f64()
            .map(Value::Float)
            .unwrap_or_else(|| Value::Text(d.to_string())),
        None => Value::Null,
    }
}

fn unsigned(n: Option<u64>) -> Value {
    match n {
        Some(n) => i64::try_from(n)
            .map(Value::Int)
            .unwrap_or(Value::Float(n as f64)),
        None => Value::Null,
    }
}

fn query_error(backend: &str, column: &str, e: sqlx::Error) -> Error {
    Error::Query(format!("{}: cannot decode column '{}': {}", backend, column, e))
}

#[cfg(feature = "postgres")]
pub(crate) fn pg_row(row: &sqlx::postgres::PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .map(|col| {
            let i = col.ordinal();
            let value: std::result::Result<Value, sqlx::Error> = match col.type_info().name() {
                "BOOL" => row
                    .try_get::<Option<bool>, _>(i)
                    .map(|v| v.map(i64::from).into()),
                "INT2" => row.try_get::<Option<i16>, _>(i).map(|v| v.map(i64::from).into()),
                "INT4" => row.try_get::<Option<i32>, _>(i).map(|v| v.map(i64::from).into()),
                "INT8" => row.try_get::<Option<i64>, _>(i).map(Value::from),
                "FLOAT4" => row.try_get::<Option<f32>, _>(i).map(|v| v.map(f64::from).into()),
                "FLOAT8" => row.try_get::<Option<f64>, _>(i).map(Value::from),
                "NUMERIC" => row.try_get::<Option<Decimal>, _>(i).map(decimal),
                _ => row.try_get::<Option<String>, _>(i).map(Value::from),
            };
            value.map_err(|e| query_error("postgresql", col.name(), e))
        })
        .collect()
}

#[cfg(feature = "mysql")]
pub(crate) fn mysql_row(row: &sqlx::mysql::MySqlRow) -> Result<Row> {
    row.columns()
        .iter()
        .map(|col| {
            let i = col.ordinal();
            let name = col.type_info().name();
            let value: std::result::Result<Value, sqlx::Error> = if name == "NULL" {
                Ok(Value::Null)
            } else if name.ends_with("UNSIGNED") {
                row.try_get::<Option<u64>, _>(i).map(unsigned)
            } else if name.contains("INT") || name == "BOOLEAN" {
                row.try_get::<Option<i64>, _>(i).map(Value::from)
            } else {
                match name {
                    "FLOAT" => row.try_get::<Option<f32>, _>(i).map(|v| v.map(f64::from).into()),
                    "DOUBLE" => row.try_get::<Option<f64>, _>(i).map(Value::from),
                    "DECIMAL" => row.try_get::<Option<Decimal>, _>(i).map(decimal),
                    _ => row.try_get::<Option<String>, _>(i).map(Value::from),
                }
            };
            value.map_err(|e| query_error("mysql", col.name(), e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_conversion() {
        assert_eq!(decimal(Some(Decimal::new(25, 1))), Value::Float(2.5));
        assert_eq!(decimal(None), Value::Null);
    }

    #[test]
    fn test_unsigned_conversion() {
        assert_eq!(unsigned(Some(7)), Value::Int(7));
        assert_eq!(unsigned(Some(u64::MAX)), Value::Float(u64::MAX as f64));
        assert_eq!(unsigned(None), Value::Null);
    }
}
