//! The generic storage-record representation.
//!
//! A [`Record`] is what caller-supplied transforms read from and write to:
//! a typed attribute map plus the storage handle for records materialized by
//! a fetch. [`Value`] covers every attribute kind the schema can declare.

use crate::models::StorageHandle;
use crate::storage::schema::AttributeKind;
use crate::{DataError, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// UTF-8 text.
    Text(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// Boolean, stored as an integer 0/1.
    Boolean(bool),
    /// UTC timestamp, stored as Unix epoch seconds.
    Timestamp(DateTime<Utc>),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Whether this value can be stored under the given attribute kind.
    ///
    /// `Null` is storable under any kind; required-ness is checked
    /// separately at staging time.
    pub(crate) const fn matches(&self, kind: AttributeKind) -> bool {
        matches!(
            (self, kind),
            (Self::Null, _)
                | (Self::Text(_), AttributeKind::Text)
                | (Self::Integer(_), AttributeKind::Integer)
                | (Self::Real(_), AttributeKind::Real)
                | (Self::Boolean(_), AttributeKind::Boolean)
                | (Self::Timestamp(_), AttributeKind::Timestamp)
                | (Self::Blob(_), AttributeKind::Blob)
        )
    }

    /// Converts to the engine-level value for parameter binding.
    pub(crate) fn to_sql_value(&self) -> rusqlite::types::Value {
        match self {
            Self::Null => rusqlite::types::Value::Null,
            Self::Text(text) => rusqlite::types::Value::Text(text.clone()),
            Self::Integer(value) => rusqlite::types::Value::Integer(*value),
            Self::Real(value) => rusqlite::types::Value::Real(*value),
            Self::Boolean(value) => rusqlite::types::Value::Integer(i64::from(*value)),
            Self::Timestamp(at) => rusqlite::types::Value::Integer(at.timestamp()),
            Self::Blob(bytes) => rusqlite::types::Value::Blob(bytes.clone()),
        }
    }

    /// Decodes an engine-level value under the declared attribute kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value does not fit the declared kind,
    /// which indicates a store written by an incompatible schema.
    pub(crate) fn from_sql_value(
        value: rusqlite::types::Value,
        kind: AttributeKind,
        attribute: &str,
    ) -> Result<Self> {
        use rusqlite::types::Value as Sql;

        let decoded = match (value, kind) {
            (Sql::Null, _) => Some(Self::Null),
            (Sql::Text(text), AttributeKind::Text) => Some(Self::Text(text)),
            (Sql::Integer(value), AttributeKind::Integer) => Some(Self::Integer(value)),
            (Sql::Integer(value), AttributeKind::Boolean) => Some(Self::Boolean(value != 0)),
            (Sql::Integer(value), AttributeKind::Timestamp) => Utc
                .timestamp_opt(value, 0)
                .single()
                .map(Self::Timestamp),
            (Sql::Real(value), AttributeKind::Real) => Some(Self::Real(value)),
            // Integer-typed columns may hand back integers for REAL affinity.
            #[allow(clippy::cast_precision_loss)]
            (Sql::Integer(value), AttributeKind::Real) => Some(Self::Real(value as f64)),
            (Sql::Blob(bytes), AttributeKind::Blob) => Some(Self::Blob(bytes)),
            _ => None,
        };

        decoded.ok_or_else(|| {
            DataError::operation(format!(
                "attribute '{attribute}' holds a value incompatible with its declared kind"
            ))
        })
    }
}

/// A storage record: the unit the caller-supplied transforms operate on.
///
/// Records materialized by a fetch carry the storage handle of the row they
/// came from; records under construction for an insert do not.
#[derive(Debug, Clone)]
pub struct Record {
    entity: String,
    handle: Option<StorageHandle>,
    values: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record for the given entity kind.
    pub(crate) fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            handle: None,
            values: BTreeMap::new(),
        }
    }

    pub(crate) fn set_handle(&mut self, handle: StorageHandle) {
        self.handle = Some(handle);
    }

    pub(crate) const fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub(crate) fn into_values(self) -> BTreeMap<String, Value> {
        self.values
    }

    /// Returns the entity kind this record belongs to.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Returns the storage handle, present on fetched records.
    #[must_use]
    pub const fn handle(&self) -> Option<&StorageHandle> {
        self.handle.as_ref()
    }

    /// Sets an attribute value.
    pub fn set(&mut self, attribute: impl Into<String>, value: Value) {
        self.values.insert(attribute.into(), value);
    }

    /// Sets a text attribute.
    pub fn set_text(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.set(attribute, Value::Text(value.into()));
    }

    /// Sets an integer attribute.
    pub fn set_integer(&mut self, attribute: impl Into<String>, value: i64) {
        self.set(attribute, Value::Integer(value));
    }

    /// Sets a real attribute.
    pub fn set_real(&mut self, attribute: impl Into<String>, value: f64) {
        self.set(attribute, Value::Real(value));
    }

    /// Sets a boolean attribute.
    pub fn set_boolean(&mut self, attribute: impl Into<String>, value: bool) {
        self.set(attribute, Value::Boolean(value));
    }

    /// Sets a timestamp attribute.
    pub fn set_timestamp(&mut self, attribute: impl Into<String>, value: DateTime<Utc>) {
        self.set(attribute, Value::Timestamp(value));
    }

    /// Returns an attribute value, if set and non-null.
    #[must_use]
    pub fn value(&self, attribute: &str) -> Option<&Value> {
        match self.values.get(attribute) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// Returns a text attribute.
    #[must_use]
    pub fn text(&self, attribute: &str) -> Option<&str> {
        match self.value(attribute) {
            Some(Value::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Returns an integer attribute.
    #[must_use]
    pub fn integer(&self, attribute: &str) -> Option<i64> {
        match self.value(attribute) {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns a real attribute.
    #[must_use]
    pub fn real(&self, attribute: &str) -> Option<f64> {
        match self.value(attribute) {
            Some(Value::Real(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns a boolean attribute.
    #[must_use]
    pub fn boolean(&self, attribute: &str) -> Option<bool> {
        match self.value(attribute) {
            Some(Value::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns a timestamp attribute.
    #[must_use]
    pub fn timestamp(&self, attribute: &str) -> Option<DateTime<Utc>> {
        match self.value(attribute) {
            Some(Value::Timestamp(at)) => Some(*at),
            _ => None,
        }
    }

    /// Returns a blob attribute.
    #[must_use]
    pub fn blob(&self, attribute: &str) -> Option<&[u8]> {
        match self.value(attribute) {
            Some(Value::Blob(bytes)) => Some(bytes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accessors() {
        let mut record = Record::new("user_info");
        record.set_text("username", "u1");
        record.set_integer("logins", 3);
        record.set_real("height", 1.82);
        record.set_boolean("consent_to_share_data", true);
        let now = Utc::now();
        record.set_timestamp("date_of_birth", now);
        record.set("avatar", Value::Blob(vec![1, 2, 3]));
        record.set("unused", Value::Null);

        assert_eq!(record.entity(), "user_info");
        assert_eq!(record.text("username"), Some("u1"));
        assert_eq!(record.integer("logins"), Some(3));
        assert_eq!(record.real("height"), Some(1.82));
        assert_eq!(record.boolean("consent_to_share_data"), Some(true));
        assert_eq!(record.timestamp("date_of_birth"), Some(now));
        assert_eq!(record.blob("avatar"), Some(&[1u8, 2, 3][..]));
        assert!(record.value("unused").is_none());
        assert!(record.value("missing").is_none());
        assert!(record.handle().is_none());
    }

    #[test]
    fn test_sql_round_trip() {
        let at = Utc.timestamp_opt(1_454_198_400, 0).single().unwrap();
        let cases = [
            (Value::Text("u1".to_string()), AttributeKind::Text),
            (Value::Integer(42), AttributeKind::Integer),
            (Value::Real(1.5), AttributeKind::Real),
            (Value::Boolean(true), AttributeKind::Boolean),
            (Value::Timestamp(at), AttributeKind::Timestamp),
            (Value::Blob(vec![0xde, 0xad]), AttributeKind::Blob),
            (Value::Null, AttributeKind::Text),
        ];

        for (value, kind) in cases {
            let sql = value.to_sql_value();
            let back = Value::from_sql_value(sql, kind, "attr").unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_boolean_encoding() {
        assert_eq!(
            Value::Boolean(true).to_sql_value(),
            rusqlite::types::Value::Integer(1)
        );
        assert_eq!(
            Value::Boolean(false).to_sql_value(),
            rusqlite::types::Value::Integer(0)
        );
    }

    #[test]
    fn test_incompatible_storage_value() {
        let result = Value::from_sql_value(
            rusqlite::types::Value::Text("oops".to_string()),
            AttributeKind::Integer,
            "height",
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("height"));
    }

    #[test]
    fn test_kind_matching() {
        assert!(Value::Null.matches(AttributeKind::Blob));
        assert!(Value::Text(String::new()).matches(AttributeKind::Text));
        assert!(!Value::Text(String::new()).matches(AttributeKind::Integer));
        assert!(!Value::Integer(1).matches(AttributeKind::Boolean));
    }
}
