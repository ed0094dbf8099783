//! Error types and driver-error translation.
//!
//! Raw database failures are first translated into a [`DriverError`] exposing
//! the optional SQLSTATE code and detail message, then matched against the
//! named [`ConstraintSignature`] constants. A match raises the corresponding
//! [`AdapterError`] domain variant; anything else is rethrown verbatim as
//! [`AdapterError::Database`].

use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

/// Errors raised by the adapter.
///
/// Missing rows are never an error: reads return `Ok(None)` or an empty
/// vector. Only the two constraint-violation cases become domain variants;
/// every other database failure passes through unchanged.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A key row was inserted with an id that already exists.
    #[error("key id already exists")]
    DuplicateKeyId,

    /// A session or key row referenced a user id with no matching user row.
    #[error("session or key references a nonexistent user")]
    InvalidUserId,

    /// A partial update was requested with no fields to set.
    #[error("update requires at least one field")]
    EmptyFieldSet,

    /// A fetched row lacked a column the record layout requires.
    #[error("row is missing expected column `{0}`")]
    MissingColumn(&'static str),

    /// A fetched row held an unexpected type in a required column.
    #[error("column `{0}` holds an unexpected type")]
    UnexpectedType(&'static str),

    /// Any other database failure, rethrown unchanged.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl AdapterError {
    /// The host-framework error code for domain variants, if any.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::DuplicateKeyId => Some("AUTH_DUPLICATE_KEY_ID"),
            Self::InvalidUserId => Some("AUTH_INVALID_USER_ID"),
            _ => None,
        }
    }
}

/// A known constraint-violation shape: a SQLSTATE code plus a substring of
/// the server's detail message.
///
/// The two recognized signatures are tied to Postgres's constraint-violation
/// encoding and kept here as named constants rather than inline strings at
/// each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintSignature {
    /// SQLSTATE error code, e.g. `23505`.
    pub code: &'static str,
    /// Substring the error detail must contain, e.g. `Key (id)`.
    pub detail_fragment: &'static str,
}

impl ConstraintSignature {
    /// Whether a translated code/detail pair matches this signature. A
    /// missing code or detail never matches.
    pub fn matches(&self, code: Option<&str>, detail: Option<&str>) -> bool {
        code == Some(self.code)
            && detail.is_some_and(|detail| detail.contains(self.detail_fragment))
    }
}

/// Foreign-key violation on a session/key row's user reference.
pub const USER_REFERENCE_FK: ConstraintSignature = ConstraintSignature {
    code: "23503",
    detail_fragment: "Key (user_id)",
};

/// Unique violation on a key row's id.
pub const KEY_ID_UNIQUE: ConstraintSignature = ConstraintSignature {
    code: "23505",
    detail_fragment: "Key (id)",
};

/// A driver failure translated into a normalized shape, keeping the original
/// error for verbatim rethrowing.
#[derive(Debug)]
pub struct DriverError {
    /// Machine-readable SQLSTATE code, when the failure came from the server.
    pub code: Option<String>,
    /// Human-readable detail message, when the server supplied one.
    pub detail: Option<String>,
    source: sqlx::Error,
}

impl DriverError {
    /// Translates a raw sqlx failure. Non-server failures (I/O, decode,
    /// pool) translate with no code and no detail.
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        let (code, detail) = match error.as_database_error() {
            Some(database_error) => match database_error.try_downcast_ref::<PgDatabaseError>() {
                Some(pg_error) => (
                    Some(pg_error.code().to_owned()),
                    pg_error.detail().map(str::to_owned),
                ),
                None => (database_error.code().map(|code| code.into_owned()), None),
            },
            None => (None, None),
        };
        Self {
            code,
            detail,
            source: error,
        }
    }

    /// Whether this failure matches a known constraint signature.
    pub fn matches(&self, signature: &ConstraintSignature) -> bool {
        signature.matches(self.code.as_deref(), self.detail.as_deref())
    }

    /// Recovers the original error for rethrowing.
    pub fn into_source(self) -> sqlx::Error {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_requires_code_and_detail_fragment() {
        let detail = "Key (user_id)=(u9) is not present in table \"auth_user\".";
        assert!(USER_REFERENCE_FK.matches(Some("23503"), Some(detail)));
        assert!(!USER_REFERENCE_FK.matches(Some("23505"), Some(detail)));
        assert!(!USER_REFERENCE_FK.matches(None, Some(detail)));
        assert!(!USER_REFERENCE_FK.matches(Some("23503"), None));
        assert!(!USER_REFERENCE_FK.matches(Some("23503"), Some("Key (id)=(k1) already exists.")));
    }

    #[test]
    fn key_unique_signature_is_distinct_from_user_reference() {
        let detail = "Key (id)=(k1) already exists.";
        assert!(KEY_ID_UNIQUE.matches(Some("23505"), Some(detail)));
        assert!(!USER_REFERENCE_FK.matches(Some("23505"), Some(detail)));
    }

    #[test]
    fn domain_error_codes() {
        assert_eq!(AdapterError::DuplicateKeyId.code(), Some("AUTH_DUPLICATE_KEY_ID"));
        assert_eq!(AdapterError::InvalidUserId.code(), Some("AUTH_INVALID_USER_ID"));
        assert_eq!(AdapterError::EmptyFieldSet.code(), None);
    }
}
