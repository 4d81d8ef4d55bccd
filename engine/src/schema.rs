//! Schema definition and validation.
//!
//! The schema is loaded once when a store is built. Operations are checked
//! against it before they are allowed anywhere near the record store.

use crate::error::{Error, Result, SchemaViolation};
use crate::operation::{Fields, OpKind};
use crate::{CollectionName, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    /// Milliseconds since epoch
    Timestamp,
    /// Any JSON value, stored opaquely
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::String => "String",
            FieldType::Int => "Int",
            FieldType::Float => "Float",
            FieldType::Bool => "Bool",
            FieldType::Timestamp => "Timestamp",
            FieldType::Json => "Json",
        };
        f.write_str(name)
    }
}

impl FieldType {
    fn accepts(self, value: &serde_json::Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Int | FieldType::Timestamp => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Json => true,
        }
    }
}

/// Definition of a field in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Validate a value (or its absence) against this definition.
    pub fn validate(
        &self,
        value: Option<&serde_json::Value>,
    ) -> std::result::Result<(), SchemaViolation> {
        match value {
            None | Some(serde_json::Value::Null) if self.required => {
                Err(SchemaViolation::MissingRequiredField(self.name.clone()))
            }
            None | Some(serde_json::Value::Null) => Ok(()),
            Some(v) if self.field_type.accepts(v) => Ok(()),
            Some(v) => Err(SchemaViolation::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(v).to_string(),
            }),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "Null",
        serde_json::Value::Bool(_) => "Bool",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        serde_json::Value::Number(_) => "Float",
        serde_json::Value::String(_) => "String",
        serde_json::Value::Array(_) => "Array",
        serde_json::Value::Object(_) => "Object",
    }
}

/// Schema for a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    pub name: CollectionName,
    pub fields: Vec<FieldDef>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<CollectionName>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate a full field map: no undeclared names, declared types,
    /// required fields present.
    pub fn validate_fields(&self, fields: &Fields) -> std::result::Result<(), SchemaViolation> {
        if let Some(unknown) = fields.keys().find(|name| self.field(name).is_none()) {
            return Err(SchemaViolation::UnknownField {
                collection: self.name.clone(),
                field: unknown.clone(),
            });
        }

        for def in &self.fields {
            def.validate(fields.get(&def.name))?;
        }

        Ok(())
    }
}

/// Schema for the entire store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Schema version for migrations
    pub version: SchemaVersion,
    pub collections: BTreeMap<CollectionName, CollectionSchema>,
}

impl Schema {
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            collections: BTreeMap::new(),
        }
    }

    pub fn add_collection(&mut self, collection: CollectionSchema) -> &mut Self {
        self.collections.insert(collection.name.clone(), collection);
        self
    }

    /// Builder-style method to add a collection.
    pub fn with_collection(mut self, collection: CollectionSchema) -> Self {
        self.add_collection(collection);
        self
    }

    pub fn get_collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    /// Look up a collection, failing with a schema violation if it is unknown.
    pub fn collection(&self, name: &str) -> Result<&CollectionSchema> {
        self.collections
            .get(name)
            .ok_or_else(|| SchemaViolation::UnknownCollection(name.to_string()).into())
    }

    /// Check the schema itself is coherent.
    pub fn check(&self) -> Result<()> {
        for (key, collection) in &self.collections {
            if key != &collection.name {
                return Err(Error::malformed(format!(
                    "collection keyed '{}' is named '{}'",
                    key, collection.name
                )));
            }
            let mut seen = HashSet::new();
            for field in &collection.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(Error::malformed(format!(
                        "field '{}' declared twice in '{}'",
                        field.name, key
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate the target and field values of an operation.
    ///
    /// Deletes only need their collection to exist.
    pub fn validate(&self, collection: &str, kind: OpKind, fields: &Fields) -> Result<()> {
        let schema = self.collection(collection)?;
        if kind.carries_fields() {
            schema.validate_fields(fields)?;
        }
        Ok(())
    }
}
