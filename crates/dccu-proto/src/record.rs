//! Record abstractions.
//!
//! Every backend row carries an identifier, a clearance level and creation /
//! update timestamps. Typed entities implement [`Entity`]; [`Row`] covers any
//! table as a plain JSON object.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clearance::ClearanceLevel;
use crate::error::Error;
use crate::table::TableName;
use crate::{CLEARANCE_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD};

/// A row held in a view's visible set.
pub trait Record:
    Clone + fmt::Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Insert payload: the record without id, created_at and updated_at.
    type Draft: Serialize + Send + Sync;

    /// Partial update payload.
    type Patch: Serialize + Send + Sync;

    /// Backend-assigned identifier.
    fn id(&self) -> &str;

    /// Clearance level of the row, `None` if absent or unrecognized.
    fn clearance_level(&self) -> Option<ClearanceLevel>;

    /// Creation timestamp.
    fn created_at(&self) -> Option<DateTime<Utc>>;

    /// Last update timestamp.
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    /// Decode a backend row.
    fn from_value(value: Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(Error::from)
    }
}

/// A record bound to a fixed table.
pub trait Entity: Record {
    /// Table the entity lives in.
    const TABLE: TableName;
}

/// An untyped row from any table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub Map<String, Value>);

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Set a field.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Get a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Get a string field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Field names in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get_str(field)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl Record for Row {
    type Draft = Map<String, Value>;
    type Patch = Map<String, Value>;

    fn id(&self) -> &str {
        self.get_str("id").unwrap_or_default()
    }

    fn clearance_level(&self) -> Option<ClearanceLevel> {
        self.get_str(CLEARANCE_FIELD).and_then(ClearanceLevel::from_wire)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(CREATED_AT_FIELD)
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(UPDATED_AT_FIELD)
    }
}

/// Read the clearance level of a raw backend row.
pub fn clearance_of(value: &Value) -> Option<ClearanceLevel> {
    value
        .get(CLEARANCE_FIELD)
        .and_then(Value::as_str)
        .and_then(ClearanceLevel::from_wire)
}
