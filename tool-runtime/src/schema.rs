//! JSON-Schema-like descriptions of tool inputs.

use std::any::TypeId;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::constraints::Constraints;
use crate::record::{FieldType, RecordRef, ToolRecord};

/// Schema `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// JSON object.
    Object,
    /// JSON array.
    Array,
    /// JSON string.
    String,
    /// Integral JSON number.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON boolean.
    Boolean,
}

/// Generated schema node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    schema_type: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<BTreeMap<String, Schema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    additional_properties: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    minimum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maximum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, String>,
}

impl Schema {
    fn typed(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    fn circular(name: &str) -> Self {
        Self {
            description: Some(format!("Circular reference to {name}")),
            ..Self::typed(SchemaType::Object)
        }
    }

    /// `type` keyword; `None` for open values.
    #[must_use]
    pub const fn schema_type(&self) -> Option<SchemaType> {
        self.schema_type
    }

    /// Object properties keyed by wire name.
    #[must_use]
    pub const fn properties(&self) -> Option<&BTreeMap<String, Schema>> {
        self.properties.as_ref()
    }

    /// Looks up a single property schema.
    #[must_use]
    pub fn property(&self, wire_name: &str) -> Option<&Schema> {
        self.properties.as_ref()?.get(wire_name)
    }

    /// Wire names of required properties.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Element schema of an array.
    #[must_use]
    pub fn items(&self) -> Option<&Schema> {
        self.items.as_deref()
    }

    /// Value schema of a map.
    #[must_use]
    pub fn additional_properties(&self) -> Option<&Schema> {
        self.additional_properties.as_deref()
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Format hint.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Allowed values.
    #[must_use]
    pub fn enum_values(&self) -> &[String] {
        &self.enum_values
    }

    /// Verbatim entries from unrecognised directive keys.
    #[must_use]
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    fn apply(&mut self, constraints: &Constraints) {
        if let Some(minimum) = constraints.minimum() {
            self.minimum = Some(minimum.clone());
        }
        if let Some(maximum) = constraints.maximum() {
            self.maximum = Some(maximum.clone());
        }
        self.min_length = constraints.min_length().or(self.min_length);
        self.max_length = constraints.max_length().or(self.max_length);
        self.min_items = constraints.min_items().or(self.min_items);
        self.max_items = constraints.max_items().or(self.max_items);
        if let Some(pattern) = constraints.pattern() {
            self.pattern = Some(pattern.to_owned());
        }
        if !constraints.enum_values().is_empty() {
            self.enum_values = constraints.enum_values().to_vec();
        }
        if let Some(description) = constraints.description() {
            self.description = Some(description.to_owned());
        }
        if let Some(format) = constraints.format() {
            self.format = Some(format.to_owned());
        }
        if let Some(title) = constraints.title() {
            self.title = Some(title.to_owned());
        }
        for (key, value) in constraints.extra() {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Generates the input schema for record type `T`.
///
/// Never fails: kinds without a dedicated mapping are rendered as `string`,
/// and a record type that reappears on its own expansion path is replaced by
/// a placeholder object.
#[must_use]
pub fn generate_schema<T: ToolRecord>() -> Schema {
    SchemaGenerator::default().record(RecordRef::of::<T>())
}

#[derive(Default)]
struct SchemaGenerator {
    active: Vec<TypeId>,
}

impl SchemaGenerator {
    fn record(&mut self, record: RecordRef) -> Schema {
        let type_id = record.type_id();
        if self.active.contains(&type_id) {
            return Schema::circular(record.name());
        }
        self.active.push(type_id);

        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        for descriptor in record.descriptors() {
            let mut field = self.kind(descriptor.field_type());
            field.apply(descriptor.constraints());
            if descriptor.is_required() {
                required.push(descriptor.wire_name().to_owned());
            }
            properties.insert(descriptor.wire_name().to_owned(), field);
        }

        self.active.pop();

        Schema {
            properties: Some(properties),
            required,
            ..Schema::typed(SchemaType::Object)
        }
    }

    fn kind(&mut self, field_type: &FieldType) -> Schema {
        match field_type {
            FieldType::String | FieldType::Opaque(_) => Schema::typed(SchemaType::String),
            FieldType::Integer => Schema::typed(SchemaType::Integer),
            FieldType::Number => Schema::typed(SchemaType::Number),
            FieldType::Boolean => Schema::typed(SchemaType::Boolean),
            FieldType::Binary => Schema {
                format: Some("binary".to_owned()),
                ..Schema::typed(SchemaType::String)
            },
            FieldType::Array(inner) => Schema {
                items: Some(Box::new(self.kind(inner))),
                ..Schema::typed(SchemaType::Array)
            },
            FieldType::Map(inner) => Schema {
                additional_properties: Some(Box::new(self.kind(inner))),
                ..Schema::typed(SchemaType::Object)
            },
            FieldType::Record(record) => self.record(*record),
            FieldType::Any => Schema::default(),
        }
    }
}
