//! Dynamic SQL values shuttled between host types and the driver.
//!
//! [`SqlValue`] is the cell type that crosses the binding boundary in both
//! directions: input accessors produce one per parameter, and [`decode`]
//! writes one into each output destination.
//!
//! [`decode`]: crate::primed::PrimedQuery::decode

use std::fmt;

use thiserror::Error;

/// The coarse kind of a [`SqlValue`] or of a host-type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// The NULL value.
    Null,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Text.
    Text,
    /// Binary blob.
    Blob,
}

impl ValueKind {
    /// Returns the kind as a lowercase word for error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Blob => "blob",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Blob(_) => ValueKind::Blob,
        }
    }

    /// Returns true if the value is NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Failure to move a [`SqlValue`] into a concrete field type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The value's kind does not match the field's kind.
    #[error("expected {want} value, got {got}")]
    Kind {
        /// The kind the field requires.
        want: ValueKind,
        /// The kind the value had.
        got: ValueKind,
    },
    /// The integer does not fit the target field's width.
    #[error("integer value {value} does not fit the target field")]
    OutOfRange {
        /// The offending value.
        value: i64,
    },
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(self)
    }
}

impl ToSqlValue for i32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for i16 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for i8 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for u32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for u16 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for u8 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

/// Trait for field types that can be recovered from a SQL value.
///
/// The associated [`KIND`](Self::KIND) is recorded in type-info schemas and
/// used by decode error messages.
pub trait FromSqlValue: Sized {
    /// The kind this type expects.
    const KIND: ValueKind;

    /// Converts a `SqlValue` into this type.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueError`] when the value's kind does not match or the
    /// value does not fit.
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError>;
}

fn kind_error(want: ValueKind, got: &SqlValue) -> ValueError {
    ValueError::Kind {
        want,
        got: got.kind(),
    }
}

impl FromSqlValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            other => Err(kind_error(Self::KIND, &other)),
        }
    }
}

impl FromSqlValue for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Int(n) => Ok(n),
            other => Err(kind_error(Self::KIND, &other)),
        }
    }
}

impl FromSqlValue for i32 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Int(n) => {
                Self::try_from(n).map_err(|_| ValueError::OutOfRange { value: n })
            }
            other => Err(kind_error(Self::KIND, &other)),
        }
    }
}

impl FromSqlValue for i16 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Int(n) => {
                Self::try_from(n).map_err(|_| ValueError::OutOfRange { value: n })
            }
            other => Err(kind_error(Self::KIND, &other)),
        }
    }
}

impl FromSqlValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Float(f) => Ok(f),
            // Drivers commonly return whole floats as integers.
            SqlValue::Int(n) => Ok(n as Self),
            other => Err(kind_error(Self::KIND, &other)),
        }
    }
}

impl FromSqlValue for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        f64::from_sql_value(value).map(|f| f as Self)
    }
}

impl FromSqlValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Text(s) => Ok(s),
            other => Err(kind_error(Self::KIND, &other)),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Blob;

    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Blob(b) => Ok(b),
            other => Err(kind_error(Self::KIND, &other)),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}
