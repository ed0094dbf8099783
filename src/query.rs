//! SQL statement building.
//!
//! Statements are assembled from escaped identifiers and `$n` placeholders
//! whose numbering follows the order of a [`FieldSet`], so the argument
//! sequence returned alongside each statement is always aligned with the
//! placeholders it produced.

use crate::value::SqlValue;

/// Quotes a table or column name so it is safe to interpolate into a
/// statement. Embedded double quotes are doubled per the SQL standard.
pub fn escape_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// An order-stable mapping of column name to value.
///
/// Used both for full-row inserts and for partial-update patches; only the
/// columns present in the set appear in the generated statement, in insertion
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: Vec<(String, SqlValue)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Appends a column.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Looks up a value by column name.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub(crate) fn values(&self) -> Vec<SqlValue> {
        self.fields.iter().map(|(_, value)| value.clone()).collect()
    }
}

/// Builds `INSERT INTO <table> (...) VALUES ($1, ...)` plus its argument
/// sequence. `table` must already be escaped; column names are escaped here.
pub(crate) fn insert_statement(table: &str, fields: &FieldSet) -> (String, Vec<SqlValue>) {
    let columns = fields
        .iter()
        .map(|(name, _)| escape_identifier(name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=fields.len())
        .map(|index| format!("${index}"))
        .collect::<Vec<_>>()
        .join(", ");
    (
        format!("INSERT INTO {table} ({columns}) VALUES ({placeholders})"),
        fields.values(),
    )
}

/// Builds `UPDATE <table> SET ... WHERE "<key_column>" = $n` where `$n` is
/// the placeholder following the last patched field. The returned arguments
/// cover the SET clause only; the caller appends the key value. `table` must
/// already be escaped; the key column is escaped here like the SET columns.
pub(crate) fn update_statement(
    table: &str,
    fields: &FieldSet,
    key_column: &str,
) -> (String, Vec<SqlValue>) {
    let assignments = fields
        .iter()
        .enumerate()
        .map(|(index, (name, _))| format!("{} = ${}", escape_identifier(name), index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    (
        format!(
            "UPDATE {table} SET {assignments} WHERE {} = ${}",
            escape_identifier(key_column),
            fields.len() + 1
        ),
        fields.values(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_plain_and_quoted_identifiers() {
        assert_eq!(escape_identifier("auth_user"), "\"auth_user\"");
        assert_eq!(escape_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn insert_statement_numbers_placeholders_in_field_order() {
        let fields = FieldSet::new()
            .with("id", "u1")
            .with("username", "alice")
            .with("age", 30_i64);
        let (sql, args) = insert_statement("\"auth_user\"", &fields);
        assert_eq!(
            sql,
            "INSERT INTO \"auth_user\" (\"id\", \"username\", \"age\") VALUES ($1, $2, $3)"
        );
        assert_eq!(
            args,
            vec![
                SqlValue::Text("u1".into()),
                SqlValue::Text("alice".into()),
                SqlValue::BigInt(30),
            ]
        );
    }

    #[test]
    fn update_statement_places_key_after_patched_fields() {
        let fields = FieldSet::new().with("username", "bob");
        let (sql, args) = update_statement("\"auth_user\"", &fields, "id");
        assert_eq!(
            sql,
            "UPDATE \"auth_user\" SET \"username\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(args, vec![SqlValue::Text("bob".into())]);
    }

    #[test]
    fn update_statement_escapes_the_key_column() {
        let fields = FieldSet::new().with("a", 1_i64);
        let (sql, _) = update_statement("\"t\"", &fields, "we\"ird");
        assert_eq!(sql, "UPDATE \"t\" SET \"a\" = $1 WHERE \"we\"\"ird\" = $2");
    }

    #[test]
    fn field_set_preserves_insertion_order() {
        let mut fields = FieldSet::new();
        fields.push("b", 1_i64);
        fields.push("a", 2_i64);
        let names: Vec<_> = fields.iter().map(|(name, _)| name.to_owned()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(fields.len(), 2);
        assert!(!fields.is_empty());
    }
}
