//! Compile-time record descriptors.
//!
//! `#[derive(ToolRecord)]` implements [`ToolRecord`] and [`FieldValue`] for a
//! struct. The descriptor table it produces drives schema generation, input
//! binding and constraint validation.

use std::any::TypeId;
use std::fmt;

use serde_json::{Map, Value};

use crate::binder::BindError;
use crate::constraints::Constraints;

/// Kind of a field as seen by the schema generator.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// UTF-8 text.
    String,
    /// Signed or unsigned integer of any width.
    Integer,
    /// Floating point number.
    Number,
    /// Boolean flag.
    Boolean,
    /// Raw bytes, base64 encoded on the wire.
    Binary,
    /// Ordered sequence of the inner kind.
    Array(Box<FieldType>),
    /// Text-keyed map with values of the inner kind.
    Map(Box<FieldType>),
    /// Nested record, expanded lazily.
    Record(RecordRef),
    /// Any JSON value; the schema carries no type constraint.
    Any,
    /// A kind without a dedicated schema mapping; rendered as `string`.
    Opaque(&'static str),
}

/// Lazy handle to a record type's descriptor table.
///
/// Holding function pointers rather than the table itself keeps
/// self-referential records finite.
#[derive(Clone, Copy)]
pub struct RecordRef {
    type_id: fn() -> TypeId,
    name: fn() -> &'static str,
    descriptors: fn() -> &'static [FieldDescriptor],
}

impl RecordRef {
    /// Creates a handle for the record type `T`.
    #[must_use]
    pub fn of<T: ToolRecord>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            name: T::record_name,
            descriptors: T::descriptors,
        }
    }

    /// Returns the record's [`TypeId`].
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Returns the record's declared name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        (self.name)()
    }

    /// Returns the record's field descriptors in declaration order.
    #[must_use]
    pub fn descriptors(&self) -> &'static [FieldDescriptor] {
        (self.descriptors)()
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordRef").field(&self.name()).finish()
    }
}

/// Metadata for a single non-skipped record field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    wire_name: &'static str,
    field_type: FieldType,
    constraints: Constraints,
}

impl FieldDescriptor {
    /// Builds a descriptor, parsing the raw constraint directive.
    #[must_use]
    pub fn new(
        name: &'static str,
        wire_name: &'static str,
        field_type: FieldType,
        directive: &str,
    ) -> Self {
        Self {
            name,
            wire_name,
            field_type,
            constraints: Constraints::parse(directive),
        }
    }

    /// Declared field name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Key used for this field in payloads and schemas.
    #[must_use]
    pub const fn wire_name(&self) -> &'static str {
        self.wire_name
    }

    /// Field kind.
    #[must_use]
    pub const fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Parsed constraint set.
    #[must_use]
    pub const fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Whether the directive carried the `required` marker.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.constraints.is_required()
    }
}

/// Borrowed view of a bound value, used by the validator.
pub enum FieldView<'a> {
    /// Text value.
    Text(&'a str),
    /// Numeric value widened to `f64`.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// Byte buffer length.
    Bytes(usize),
    /// Sequence elements in order.
    Sequence(Vec<&'a dyn FieldValue>),
    /// Map entries.
    Map(Vec<(&'a str, &'a dyn FieldValue)>),
    /// Nested record.
    Record(&'a dyn RecordView),
    /// Open JSON value.
    Any(&'a Value),
    /// Unset optional value.
    Absent,
}

impl FieldView<'_> {
    /// Returns `true` when the view holds its kind's zero value.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Number(number) => *number == 0.0,
            Self::Boolean(flag) => !flag,
            Self::Bytes(len) => *len == 0,
            Self::Sequence(items) => items.is_empty(),
            Self::Map(entries) => entries.is_empty(),
            Self::Record(record) => record.field_values().iter().all(|value| value.is_zero()),
            Self::Any(value) => value.is_null(),
            Self::Absent => true,
        }
    }
}

/// A type that can appear as a record field.
///
/// Implemented for the supported scalar, collection and wrapper types in
/// [`crate::binder`], and for every `#[derive(ToolRecord)]` struct.
pub trait FieldValue: Send + Sync + 'static {
    /// Schema kind for this type.
    fn field_type() -> FieldType
    where
        Self: Sized;

    /// Value a field holds when the payload does not mention it.
    fn zero() -> Self
    where
        Self: Sized;

    /// Converts an untyped payload value into this type.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] when the value has the wrong shape or does not
    /// fit the target type.
    fn bind(value: &Value) -> Result<Self, BindError>
    where
        Self: Sized;

    /// Borrowed view used for constraint checks.
    fn view(&self) -> FieldView<'_>;

    /// Whether the value counts as "not provided" for `required` checks.
    fn is_zero(&self) -> bool {
        self.view().is_zero()
    }
}

/// A struct whose fields are described by a generated descriptor table.
///
/// Derive it with `#[derive(ToolRecord)]` rather than implementing it by hand.
pub trait ToolRecord: FieldValue + Sized {
    /// Declared type name.
    fn record_name() -> &'static str;

    /// Field descriptors in declaration order, built once per process.
    fn descriptors() -> &'static [FieldDescriptor];

    /// Binds a payload object into a record value.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] for the first field that fails to convert.
    fn bind_object(object: &Map<String, Value>) -> Result<Self, BindError>;

    /// Field values aligned with [`ToolRecord::descriptors`].
    fn field_values(&self) -> Vec<&dyn FieldValue>;
}

/// Object-safe access to a record's fields.
pub trait RecordView {
    /// Declared type name.
    fn record_name(&self) -> &'static str;

    /// Field descriptors in declaration order.
    fn descriptors(&self) -> &'static [FieldDescriptor];

    /// Field values aligned with the descriptors.
    fn field_values(&self) -> Vec<&dyn FieldValue>;
}

impl<T: ToolRecord> RecordView for T {
    fn record_name(&self) -> &'static str {
        T::record_name()
    }

    fn descriptors(&self) -> &'static [FieldDescriptor] {
        T::descriptors()
    }

    fn field_values(&self) -> Vec<&dyn FieldValue> {
        ToolRecord::field_values(self)
    }
}
