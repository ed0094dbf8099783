//! Record types for the three logical tables.
//!
//! Each record pairs the fixed columns the adapter relies on (`id`,
//! `user_id`, the session expiry pair) with a [`FieldSet`] of whatever
//! additional attribute columns the caller's schema defines.

use crate::error::AdapterError;
use crate::query::FieldSet;
use crate::value::{SqlRow, SqlValue};

/// A user row: an opaque id plus arbitrary attribute columns.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub attributes: FieldSet,
}

impl UserRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: FieldSet::new(),
        }
    }

    /// Adds an attribute column, builder style.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.attributes.push(name, value);
        self
    }

    pub(crate) fn from_row(row: SqlRow) -> Result<Self, AdapterError> {
        let mut id = None;
        let mut attributes = FieldSet::new();
        for (name, value) in row.into_columns() {
            if name == "id" {
                match value {
                    SqlValue::Text(value) => id = Some(value),
                    _ => return Err(AdapterError::UnexpectedType("id")),
                }
            } else {
                attributes.push(name, value);
            }
        }
        Ok(Self {
            id: id.ok_or(AdapterError::MissingColumn("id"))?,
            attributes,
        })
    }

    pub(crate) fn to_fields(&self) -> FieldSet {
        let mut fields = FieldSet::new().with("id", self.id.as_str());
        for (name, value) in self.attributes.iter() {
            fields.push(name, value.clone());
        }
        fields
    }
}

/// A session row: id, owning user id, and the two expiry timestamps.
///
/// The expiries are stored as `BIGINT` but exposed as `f64`, matching the
/// numeric-timestamp convention of the host framework. The narrowing is
/// lossy for values beyond 2^53 and intentionally unguarded.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub active_expires: f64,
    pub idle_expires: f64,
    pub attributes: FieldSet,
}

impl SessionRecord {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        active_expires: f64,
        idle_expires: f64,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            active_expires,
            idle_expires,
            attributes: FieldSet::new(),
        }
    }

    /// Adds an attribute column, builder style.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.attributes.push(name, value);
        self
    }

    pub(crate) fn from_row(row: SqlRow) -> Result<Self, AdapterError> {
        let mut id = None;
        let mut user_id = None;
        let mut active_expires = None;
        let mut idle_expires = None;
        let mut attributes = FieldSet::new();
        for (name, value) in row.into_columns() {
            match name.as_str() {
                "id" => id = Some(expect_text(value, "id")?),
                "user_id" => user_id = Some(expect_text(value, "user_id")?),
                "active_expires" => active_expires = Some(expect_expiry(value, "active_expires")?),
                "idle_expires" => idle_expires = Some(expect_expiry(value, "idle_expires")?),
                _ => attributes.push(name, value),
            }
        }
        Ok(Self {
            id: id.ok_or(AdapterError::MissingColumn("id"))?,
            user_id: user_id.ok_or(AdapterError::MissingColumn("user_id"))?,
            active_expires: active_expires.ok_or(AdapterError::MissingColumn("active_expires"))?,
            idle_expires: idle_expires.ok_or(AdapterError::MissingColumn("idle_expires"))?,
            attributes,
        })
    }

    pub(crate) fn to_fields(&self) -> FieldSet {
        let mut fields = FieldSet::new()
            .with("id", self.id.as_str())
            .with("user_id", self.user_id.as_str())
            .with("active_expires", self.active_expires as i64)
            .with("idle_expires", self.idle_expires as i64);
        for (name, value) in self.attributes.iter() {
            fields.push(name, value.clone());
        }
        fields
    }
}

/// A key row: id, owning user id, and arbitrary attribute columns. Multiple
/// keys per user support multiple credential records.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
    pub id: String,
    pub user_id: String,
    pub attributes: FieldSet,
}

impl KeyRecord {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            attributes: FieldSet::new(),
        }
    }

    /// Adds an attribute column, builder style.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.attributes.push(name, value);
        self
    }

    pub(crate) fn from_row(row: SqlRow) -> Result<Self, AdapterError> {
        let mut id = None;
        let mut user_id = None;
        let mut attributes = FieldSet::new();
        for (name, value) in row.into_columns() {
            match name.as_str() {
                "id" => id = Some(expect_text(value, "id")?),
                "user_id" => user_id = Some(expect_text(value, "user_id")?),
                _ => attributes.push(name, value),
            }
        }
        Ok(Self {
            id: id.ok_or(AdapterError::MissingColumn("id"))?,
            user_id: user_id.ok_or(AdapterError::MissingColumn("user_id"))?,
            attributes,
        })
    }

    pub(crate) fn to_fields(&self) -> FieldSet {
        let mut fields = FieldSet::new()
            .with("id", self.id.as_str())
            .with("user_id", self.user_id.as_str());
        for (name, value) in self.attributes.iter() {
            fields.push(name, value.clone());
        }
        fields
    }
}

fn expect_text(value: SqlValue, column: &'static str) -> Result<String, AdapterError> {
    match value {
        SqlValue::Text(value) => Ok(value),
        _ => Err(AdapterError::UnexpectedType(column)),
    }
}

// BIGINT to f64; lossy beyond 2^53.
fn expect_expiry(value: SqlValue, column: &'static str) -> Result<f64, AdapterError> {
    match value {
        SqlValue::BigInt(value) => Ok(value as f64),
        _ => Err(AdapterError::UnexpectedType(column)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_row_splits_id_from_attributes() {
        let row = SqlRow::from_columns(vec![
            ("id".into(), SqlValue::Text("u1".into())),
            ("username".into(), SqlValue::Text("alice".into())),
            ("admin".into(), SqlValue::Bool(false)),
        ]);
        let user = UserRecord::from_row(row).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(
            user.attributes.get("username").and_then(SqlValue::as_text),
            Some("alice"),
        );
        assert_eq!(user.attributes.get("id"), None);
    }

    #[test]
    fn user_row_without_id_is_rejected() {
        let row = SqlRow::from_columns(vec![("username".into(), SqlValue::Text("alice".into()))]);
        assert!(matches!(
            UserRecord::from_row(row),
            Err(AdapterError::MissingColumn("id"))
        ));
    }

    #[test]
    fn session_row_normalizes_expiries_to_numbers() {
        let row = SqlRow::from_columns(vec![
            ("id".into(), SqlValue::Text("s1".into())),
            ("user_id".into(), SqlValue::Text("u1".into())),
            ("active_expires".into(), SqlValue::BigInt(1_700_000_000_000)),
            ("idle_expires".into(), SqlValue::BigInt(1_700_000_500_000)),
        ]);
        let session = SessionRecord::from_row(row).unwrap();
        assert_eq!(session.active_expires, 1_700_000_000_000.0);
        assert_eq!(session.idle_expires, 1_700_000_500_000.0);
    }

    #[test]
    fn session_fields_store_expiries_as_big_integers() {
        let session = SessionRecord::new("s1", "u1", 10.0, 20.0);
        let fields = session.to_fields();
        let values: Vec<_> = fields.iter().map(|(name, value)| (name.to_owned(), value.clone())).collect();
        assert_eq!(values[2], ("active_expires".into(), SqlValue::BigInt(10)));
        assert_eq!(values[3], ("idle_expires".into(), SqlValue::BigInt(20)));
    }

    #[test]
    fn key_fields_lead_with_id_and_user_id() {
        let key = KeyRecord::new("k1", "u1").with_attribute("hashed_password", "h");
        let names: Vec<_> = key.to_fields().iter().map(|(name, _)| name.to_owned()).collect();
        assert_eq!(names, vec!["id", "user_id", "hashed_password"]);
    }
}
