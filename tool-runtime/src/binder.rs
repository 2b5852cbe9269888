//! Conversion of untyped payloads into typed records.
//!
//! Integer targets only accept exactly integral values inside the target
//! width; nothing truncates or wraps. Paths in [`BindError`] are for logs and
//! never reach the caller.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::record::{FieldType, FieldValue, FieldView, ToolRecord};

/// Binds a payload into the record type `T`.
///
/// Unknown keys are ignored; absent or `null` fields keep their zero value.
///
/// # Errors
///
/// Returns [`BindError`] when the payload is not an object or any field fails
/// to convert.
pub fn bind<T: ToolRecord>(payload: &Value) -> Result<T, BindError> {
    bind_record(payload)
}

/// Binds a nested record value. Used by generated [`FieldValue`] impls.
///
/// # Errors
///
/// Returns [`BindError`] when the value is not an object or a field fails.
pub fn bind_record<T: ToolRecord>(value: &Value) -> Result<T, BindError> {
    match value {
        Value::Object(object) => T::bind_object(object),
        other => Err(BindError::mismatch("object", other)),
    }
}

/// Failure to convert a payload value, with the path at which it occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindError {
    kind: BindErrorKind,
    path: Vec<PathSegment>,
}

/// Reason a payload value could not be bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindErrorKind {
    /// The JSON kind does not match the target.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Target kind.
        expected: &'static str,
        /// Kind present in the payload.
        found: &'static str,
    },
    /// A fractional value was supplied for an integer target.
    #[error("value {value} is not an integer")]
    NotIntegral {
        /// Offending value.
        value: String,
    },
    /// A value does not fit the target width.
    #[error("value {value} is out of range for {target}")]
    OutOfRange {
        /// Offending value.
        value: String,
        /// Target type name.
        target: &'static str,
    },
    /// A negative value was supplied for an unsigned target.
    #[error("negative value {value} for unsigned {target}")]
    Negative {
        /// Offending value.
        value: String,
        /// Target type name.
        target: &'static str,
    },
    /// Binary data was not valid base64.
    #[error("invalid base64 data: {reason}")]
    InvalidBinary {
        /// Decoder message.
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Field(String),
    Index(usize),
}

struct PathDisplay<'a>(&'a [PathSegment]);

impl Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        // Segments are pushed innermost first while the error bubbles up.
        for (position, segment) in self.0.iter().rev().enumerate() {
            match segment {
                PathSegment::Field(name) if position == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl Display for BindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} at `{}`", self.kind, PathDisplay(&self.path))
    }
}

impl std::error::Error for BindError {}

impl BindError {
    fn new(kind: BindErrorKind) -> Self {
        Self {
            kind,
            path: Vec::new(),
        }
    }

    /// Creates a type mismatch error for `found`.
    #[must_use]
    pub fn mismatch(expected: &'static str, found: &Value) -> Self {
        Self::new(BindErrorKind::TypeMismatch {
            expected,
            found: json_kind(found),
        })
    }

    /// Prefixes the error path with a field or map key.
    #[must_use]
    pub fn within_field(mut self, name: &str) -> Self {
        self.path.push(PathSegment::Field(name.to_owned()));
        self
    }

    /// Prefixes the error path with a sequence index.
    #[must_use]
    pub fn at_index(mut self, index: usize) -> Self {
        self.path.push(PathSegment::Index(index));
        self
    }

    /// Returns the failure reason.
    #[must_use]
    pub const fn kind(&self) -> &BindErrorKind {
        &self.kind
    }

    /// Renders the failing path, e.g. `items[2].name`.
    #[must_use]
    pub fn path(&self) -> String {
        PathDisplay(&self.path).to_string()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extracts an exactly integral value from a JSON number.
fn integral(value: &Value) -> Result<i128, BindError> {
    let Value::Number(number) = value else {
        return Err(BindError::mismatch("integer", value));
    };
    if let Some(signed) = number.as_i64() {
        return Ok(i128::from(signed));
    }
    if let Some(unsigned) = number.as_u64() {
        return Ok(i128::from(unsigned));
    }

    let float = number.as_f64().unwrap_or(f64::NAN);
    if !float.is_finite() || float.fract() != 0.0 {
        return Err(BindError::new(BindErrorKind::NotIntegral {
            value: number.to_string(),
        }));
    }
    // Anything this large is outside every supported width.
    if float.abs() >= 1.0e30 {
        return Err(BindError::new(BindErrorKind::OutOfRange {
            value: number.to_string(),
            target: "integer",
        }));
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(float as i128)
}

macro_rules! signed_fields {
    ($($ty:ty),* $(,)?) => {$(
        impl FieldValue for $ty {
            fn field_type() -> FieldType {
                FieldType::Integer
            }

            fn zero() -> Self {
                0
            }

            fn bind(value: &Value) -> Result<Self, BindError> {
                let integer = integral(value)?;
                <$ty>::try_from(integer).map_err(|_| {
                    BindError::new(BindErrorKind::OutOfRange {
                        value: integer.to_string(),
                        target: stringify!($ty),
                    })
                })
            }

            #[allow(clippy::cast_precision_loss, clippy::cast_lossless)]
            fn view(&self) -> FieldView<'_> {
                FieldView::Number(*self as f64)
            }
        }
    )*};
}

macro_rules! unsigned_fields {
    ($($ty:ty),* $(,)?) => {$(
        impl FieldValue for $ty {
            fn field_type() -> FieldType {
                FieldType::Integer
            }

            fn zero() -> Self {
                0
            }

            fn bind(value: &Value) -> Result<Self, BindError> {
                let integer = integral(value)?;
                if integer < 0 {
                    return Err(BindError::new(BindErrorKind::Negative {
                        value: integer.to_string(),
                        target: stringify!($ty),
                    }));
                }
                <$ty>::try_from(integer).map_err(|_| {
                    BindError::new(BindErrorKind::OutOfRange {
                        value: integer.to_string(),
                        target: stringify!($ty),
                    })
                })
            }

            #[allow(clippy::cast_precision_loss, clippy::cast_lossless)]
            fn view(&self) -> FieldView<'_> {
                FieldView::Number(*self as f64)
            }
        }
    )*};
}

signed_fields!(i8, i16, i32, i64, isize);
unsigned_fields!(u8, u16, u32, u64, usize);

impl FieldValue for f64 {
    fn field_type() -> FieldType {
        FieldType::Number
    }

    fn zero() -> Self {
        0.0
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        match value {
            Value::Number(number) => number
                .as_f64()
                .ok_or_else(|| BindError::mismatch("number", value)),
            other => Err(BindError::mismatch("number", other)),
        }
    }

    fn view(&self) -> FieldView<'_> {
        FieldView::Number(*self)
    }
}

impl FieldValue for f32 {
    fn field_type() -> FieldType {
        FieldType::Number
    }

    fn zero() -> Self {
        0.0
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        let wide = f64::bind(value)?;
        if wide.abs() > f64::from(f32::MAX) {
            return Err(BindError::new(BindErrorKind::OutOfRange {
                value: wide.to_string(),
                target: "f32",
            }));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(wide as f32)
    }

    fn view(&self) -> FieldView<'_> {
        FieldView::Number(f64::from(*self))
    }
}

impl FieldValue for bool {
    fn field_type() -> FieldType {
        FieldType::Boolean
    }

    fn zero() -> Self {
        false
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        value
            .as_bool()
            .ok_or_else(|| BindError::mismatch("boolean", value))
    }

    fn view(&self) -> FieldView<'_> {
        FieldView::Boolean(*self)
    }
}

impl FieldValue for String {
    fn field_type() -> FieldType {
        FieldType::String
    }

    fn zero() -> Self {
        String::new()
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        match value {
            Value::String(text) => Ok(text.clone()),
            // Last-resort rendering of other scalars.
            Value::Number(number) => Ok(number.to_string()),
            Value::Bool(flag) => Ok(flag.to_string()),
            other => Err(BindError::mismatch("string", other)),
        }
    }

    fn view(&self) -> FieldView<'_> {
        FieldView::Text(self)
    }
}

impl FieldValue for PathBuf {
    fn field_type() -> FieldType {
        FieldType::Opaque("path")
    }

    fn zero() -> Self {
        PathBuf::new()
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        value
            .as_str()
            .map(PathBuf::from)
            .ok_or_else(|| BindError::mismatch("string", value))
    }

    /// Non-UTF-8 paths are viewed as raw bytes: they satisfy `required`
    /// but skip the text checks.
    fn view(&self) -> FieldView<'_> {
        match self.to_str() {
            Some(text) => FieldView::Text(text),
            None => FieldView::Bytes(self.as_os_str().len()),
        }
    }
}

impl FieldValue for Value {
    fn field_type() -> FieldType {
        FieldType::Any
    }

    fn zero() -> Self {
        Value::Null
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        Ok(value.clone())
    }

    fn view(&self) -> FieldView<'_> {
        FieldView::Any(self)
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::Array(Box::new(T::field_type()))
    }

    fn zero() -> Self {
        Vec::new()
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        let Value::Array(items) = value else {
            return Err(BindError::mismatch("array", value));
        };
        items
            .iter()
            .enumerate()
            .map(|(index, item)| T::bind(item).map_err(|err| err.at_index(index)))
            .collect()
    }

    fn view(&self) -> FieldView<'_> {
        FieldView::Sequence(self.iter().map(|item| item as &dyn FieldValue).collect())
    }
}

fn bind_entries<T: FieldValue>(value: &Value) -> Result<Vec<(String, T)>, BindError> {
    let Value::Object(object) = value else {
        return Err(BindError::mismatch("object", value));
    };
    object
        .iter()
        .map(|(key, item)| {
            T::bind(item)
                .map(|bound| (key.clone(), bound))
                .map_err(|err| err.within_field(key))
        })
        .collect()
}

impl<T: FieldValue> FieldValue for HashMap<String, T> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(T::field_type()))
    }

    fn zero() -> Self {
        HashMap::new()
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        bind_entries(value).map(|entries| entries.into_iter().collect())
    }

    fn view(&self) -> FieldView<'_> {
        FieldView::Map(
            self.iter()
                .map(|(key, item)| (key.as_str(), item as &dyn FieldValue))
                .collect(),
        )
    }
}

impl<T: FieldValue> FieldValue for BTreeMap<String, T> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(T::field_type()))
    }

    fn zero() -> Self {
        BTreeMap::new()
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        bind_entries(value).map(|entries| entries.into_iter().collect())
    }

    fn view(&self) -> FieldView<'_> {
        FieldView::Map(
            self.iter()
                .map(|(key, item)| (key.as_str(), item as &dyn FieldValue))
                .collect(),
        )
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }

    fn zero() -> Self {
        None
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        match value {
            Value::Null => Ok(None),
            other => T::bind(other).map(Some),
        }
    }

    fn view(&self) -> FieldView<'_> {
        self.as_ref().map_or(FieldView::Absent, FieldValue::view)
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }

    fn zero() -> Self {
        Box::new(T::zero())
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        T::bind(value).map(Box::new)
    }

    fn view(&self) -> FieldView<'_> {
        (**self).view()
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

/// Byte buffer carried as a base64 string on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Binary(pub Vec<u8>);

impl Binary {
    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the wrapper, returning the bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Binary {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

impl FieldValue for Binary {
    fn field_type() -> FieldType {
        FieldType::Binary
    }

    fn zero() -> Self {
        Self::default()
    }

    fn bind(value: &Value) -> Result<Self, BindError> {
        let Value::String(encoded) = value else {
            return Err(BindError::mismatch("string", value));
        };
        STANDARD.decode(encoded.as_bytes()).map(Self).map_err(|err| {
            BindError::new(BindErrorKind::InvalidBinary {
                reason: err.to_string(),
            })
        })
    }

    fn view(&self) -> FieldView<'_> {
        FieldView::Bytes(self.0.len())
    }
}
