//! Schema Descriptors
//!
//! Tools and components describe their inputs with a closed set of schema
//! kinds. Each kind has exactly one conversion to the JSON Schema sent over
//! the wire.

use schemars::JsonSchema;
use serde_json::{json, Value};

/// A schema derived from a Rust type via `schemars`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedSchema {
    type_name: String,
    schema: Value,
}

impl TypedSchema {
    /// Name of the Rust type the schema was derived from.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// Input/output schema of a tool or component.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDescriptor {
    /// A hand-written JSON Schema document.
    JsonSchema(Value),
    /// A schema generated from a type implementing `schemars::JsonSchema`.
    Typed(TypedSchema),
}

impl SchemaDescriptor {
    /// Wrap a raw JSON Schema value.
    pub fn json(schema: Value) -> Self {
        SchemaDescriptor::JsonSchema(schema)
    }

    /// Derive the schema of `T`.
    pub fn of<T: JsonSchema>() -> Self {
        let schema = schemars::schema_for!(T);
        SchemaDescriptor::Typed(TypedSchema {
            type_name: T::schema_name().into_owned(),
            schema: schema.as_value().clone(),
        })
    }

    /// An object schema with no declared properties.
    pub fn empty_object() -> Self {
        SchemaDescriptor::JsonSchema(json!({ "type": "object", "properties": {} }))
    }

    /// Convert to the JSON Schema sent to the server.
    ///
    /// Derived schemas drop their `$schema` meta key.
    pub fn to_json_schema(&self) -> Value {
        match self {
            SchemaDescriptor::JsonSchema(value) => value.clone(),
            SchemaDescriptor::Typed(typed) => {
                let mut value = typed.schema.clone();
                if let Some(obj) = value.as_object_mut() {
                    obj.remove("$schema");
                }
                value
            }
        }
    }
}

impl Default for SchemaDescriptor {
    fn default() -> Self {
        Self::empty_object()
    }
}
