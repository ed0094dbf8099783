//! Dynamic SQL value and row representations.
//!
//! The adapter stores schema-less attribute columns, so rows cannot be mapped
//! onto fixed structs. [`SqlValue`] is the small vocabulary of column values
//! the adapter understands, and [`SqlRow`] is an order-preserving sequence of
//! named values decoded from a Postgres result row.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};

/// The column types in [`SqlValue`]'s vocabulary.
///
/// Carried by [`SqlValue::Null`] so a null binds with the type of the column
/// it targets; an untyped null would be sent as TEXT and rejected by the
/// server when assigned to a non-text column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Bool,
    BigInt,
    Double,
    Text,
    Bytes,
}

/// A single dynamically-typed column value.
///
/// Covers the column types the adapter's tables use: text identifiers,
/// `BIGINT` expiry timestamps, and whatever scalar attribute columns the
/// caller adds to the user/key tables.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(SqlType),
    Bool(bool),
    BigInt(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Borrows the inner string if this value is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the inner integer if this value is a big integer.
    pub fn as_big_int(&self) -> Option<i64> {
        match self {
            Self::BigInt(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::BigInt(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// One decoded result row: column names paired with values, in the order the
/// database returned them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    /// Looks up a column value by name.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Removes a column by name, returning its value if present.
    pub fn remove(&mut self, name: &str) -> Option<SqlValue> {
        let index = self.columns.iter().position(|(column, _)| column == name)?;
        Some(self.columns.remove(index).1)
    }

    /// Consumes the row, yielding its columns in result order.
    pub fn into_columns(self) -> Vec<(String, SqlValue)> {
        self.columns
    }

    #[cfg(test)]
    pub(crate) fn from_columns(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported column type `{0}`")]
struct UnsupportedColumnType(String);

pub(crate) type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Binds one value onto a query, keeping the placeholder index implicit in
/// call order. Callers must bind values in the same order the statement
/// builder numbered them.
pub(crate) fn bind_value<'q>(query: PgQuery<'q>, value: &SqlValue) -> PgQuery<'q> {
    match value {
        SqlValue::Null(SqlType::Bool) => query.bind(Option::<bool>::None),
        SqlValue::Null(SqlType::BigInt) => query.bind(Option::<i64>::None),
        SqlValue::Null(SqlType::Double) => query.bind(Option::<f64>::None),
        SqlValue::Null(SqlType::Text) => query.bind(Option::<String>::None),
        SqlValue::Null(SqlType::Bytes) => query.bind(Option::<Vec<u8>>::None),
        SqlValue::Bool(value) => query.bind(*value),
        SqlValue::BigInt(value) => query.bind(*value),
        SqlValue::Double(value) => query.bind(*value),
        SqlValue::Text(value) => query.bind(value.clone()),
        SqlValue::Bytes(value) => query.bind(value.clone()),
    }
}

/// Decodes a Postgres row into the dynamic representation, dispatching on the
/// server-reported type name. Narrower integer and float types widen to
/// `BigInt`/`Double`.
pub(crate) fn decode_row(row: &PgRow) -> Result<SqlRow, sqlx::Error> {
    let mut columns = Vec::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        let type_name = column.type_info().name();
        let sql_type = match type_name {
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => SqlType::Text,
            "INT8" | "INT4" | "INT2" => SqlType::BigInt,
            "FLOAT8" | "FLOAT4" => SqlType::Double,
            "BOOL" => SqlType::Bool,
            "BYTEA" => SqlType::Bytes,
            other => {
                return Err(sqlx::Error::ColumnDecode {
                    index: column.name().to_string(),
                    source: Box::new(UnsupportedColumnType(other.to_string())),
                })
            }
        };
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            SqlValue::Null(sql_type)
        } else {
            match type_name {
                "INT8" => SqlValue::BigInt(row.try_get(index)?),
                "INT4" => SqlValue::BigInt(i64::from(row.try_get::<i32, _>(index)?)),
                "INT2" => SqlValue::BigInt(i64::from(row.try_get::<i16, _>(index)?)),
                "FLOAT8" => SqlValue::Double(row.try_get(index)?),
                "FLOAT4" => SqlValue::Double(f64::from(row.try_get::<f32, _>(index)?)),
                "BOOL" => SqlValue::Bool(row.try_get(index)?),
                "BYTEA" => SqlValue::Bytes(row.try_get(index)?),
                _ => SqlValue::Text(row.try_get(index)?),
            }
        };
        columns.push((column.name().to_string(), value));
    }
    Ok(SqlRow { columns })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lookup_and_removal() {
        let mut row = SqlRow::from_columns(vec![
            ("id".into(), SqlValue::Text("u1".into())),
            ("age".into(), SqlValue::BigInt(30)),
        ]);
        assert_eq!(row.get("id").and_then(SqlValue::as_text), Some("u1"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.remove("age"), Some(SqlValue::BigInt(30)));
        assert_eq!(row.remove("age"), None);
        assert_eq!(row.into_columns().len(), 1);
    }

    #[test]
    fn value_conversions() {
        assert_eq!(SqlValue::from("alice"), SqlValue::Text("alice".into()));
        assert_eq!(SqlValue::from(7_i64), SqlValue::BigInt(7));
        assert_eq!(SqlValue::from(true), SqlValue::Bool(true));
        assert_eq!(SqlValue::Text("x".into()).as_big_int(), None);
    }

    #[test]
    fn nulls_are_distinguished_by_column_type() {
        assert_ne!(
            SqlValue::Null(SqlType::Text),
            SqlValue::Null(SqlType::BigInt)
        );
        assert_eq!(SqlValue::Null(SqlType::Bool), SqlValue::Null(SqlType::Bool));
        assert_eq!(SqlValue::Null(SqlType::BigInt).as_big_int(), None);
    }
}
