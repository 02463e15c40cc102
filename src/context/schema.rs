//! Hand-maintained schema descriptions for context tables.
//!
//! Schemas are introspection metadata only. Nothing validates stored
//! entries against them.

use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical type of a field in a context table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Datetime,
}

impl FieldType {
    /// Get the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Datetime => "datetime",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary key and ordered field list of a context table.
///
/// Serializes as `{ "primaryKey": "...", "fields": { "name": "type", ... } }`
/// with fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    primary_key: String,
    fields: Vec<(String, FieldType)>,
}

impl TableSchema {
    /// Start a schema with the given primary key field.
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field. Redeclaring a field replaces its type in place.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = field_type,
            None => self.fields.push((name, field_type)),
        }
        self
    }

    /// Name of the primary key field.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[(String, FieldType)] {
        &self.fields
    }

    /// Look up the declared type of a field.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }
}

struct FieldMap<'a>(&'a [(String, FieldType)]);

impl Serialize for FieldMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, ty)| (name, ty)))
    }
}

impl Serialize for TableSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TableSchema", 2)?;
        state.serialize_field("primaryKey", &self.primary_key)?;
        state.serialize_field("fields", &FieldMap(&self.fields))?;
        state.end()
    }
}
