//! Value types which can be stored within a column.
//!
//! Columns are parameterized by their element type at construction, the
//! [DataType] tag is only consulted at the dynamic [Value] boundary.

use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::net::Ipv6Addr;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ColumnError;

#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
/// The value type of a column.
///
/// These types have no concept of nested structures.
pub enum DataType {
    String = 1,
    I8 = 2,
    I16 = 3,
    I32 = 4,
    I64 = 5,
    F32 = 6,
    F64 = 7,
    Bytes = 8,
    Ipv6 = 9,
}

impl DataType {
    /// All supported data types in tag order.
    pub const ALL: [DataType; 9] = [
        DataType::String,
        DataType::I8,
        DataType::I16,
        DataType::I32,
        DataType::I64,
        DataType::F32,
        DataType::F64,
        DataType::Bytes,
        DataType::Ipv6,
    ];

    /// Returns the lowercase name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::I8 => "i8",
            DataType::I16 => "i16",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::Bytes => "bytes",
            DataType::Ipv6 => "ipv6",
        }
    }

    /// Parses a raw text value as this type.
    ///
    /// Bytes are taken verbatim from the UTF-8 text.
    pub fn parse_value(&self, raw: &str) -> Option<Value> {
        let value = match self {
            DataType::String => Value::String(raw.to_string()),
            DataType::I8 => Value::I8(raw.trim().parse().ok()?),
            DataType::I16 => Value::I16(raw.trim().parse().ok()?),
            DataType::I32 => Value::I32(raw.trim().parse().ok()?),
            DataType::I64 => Value::I64(raw.trim().parse().ok()?),
            DataType::F32 => Value::F32(raw.trim().parse().ok()?),
            DataType::F64 => Value::F64(raw.trim().parse().ok()?),
            DataType::Bytes => Value::Bytes(raw.as_bytes().to_vec()),
            DataType::Ipv6 => Value::Ipv6(raw.trim().parse().ok()?),
        };
        Some(value)
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|dt| dt.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown data type: {s:?}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A dynamically typed column value.
pub enum Value {
    String(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
    Ipv6(Ipv6Addr),
}

impl Value {
    /// Returns the [DataType] tag of the value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::I8(_) => DataType::I8,
            Value::I16(_) => DataType::I16,
            Value::I32(_) => DataType::I32,
            Value::I64(_) => DataType::I64,
            Value::F32(_) => DataType::F32,
            Value::F64(_) => DataType::F64,
            Value::Bytes(_) => DataType::Bytes,
            Value::Ipv6(_) => DataType::Ipv6,
        }
    }
}

/// A type which can be stored within a column.
///
/// Equality and hashing are total: floats compare by their bit pattern so
/// a `NaN` written to a column is read back as the same `NaN`.
pub trait ColumnValue:
    Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The type tag of the value.
    const DATA_TYPE: DataType;

    /// Converts the value into its dynamic form.
    fn into_value(self) -> Value;

    /// Attempts to extract a value of this type from a dynamic [Value].
    fn try_from_value(value: Value) -> Result<Self, ColumnError>;

    /// Returns if the two values are identical.
    fn value_eq(&self, other: &Self) -> bool;

    /// Feeds the value into the given hasher, consistent with [Self::value_eq].
    fn value_hash<H: Hasher>(&self, state: &mut H);

    /// The number of bytes owned by the value outside of its inline size.
    fn heap_size(&self) -> usize {
        0
    }

    /// Writes the value in a human readable form.
    fn fmt_value(&self, f: &mut Formatter<'_>) -> fmt::Result;
}

fn mismatch<T: ColumnValue>(actual: &Value) -> ColumnError {
    ColumnError::TypeMismatch {
        expected: T::DATA_TYPE,
        actual: actual.data_type(),
    }
}

macro_rules! impl_column_value {
    ($t:ty, $variant:ident) => {
        impl ColumnValue for $t {
            const DATA_TYPE: DataType = DataType::$variant;

            #[inline]
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn try_from_value(value: Value) -> Result<Self, ColumnError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch::<Self>(&other)),
                }
            }

            #[inline]
            fn value_eq(&self, other: &Self) -> bool {
                self == other
            }

            #[inline]
            fn value_hash<H: Hasher>(&self, state: &mut H) {
                Hash::hash(self, state)
            }

            fn fmt_value(&self, f: &mut Formatter<'_>) -> fmt::Result {
                Display::fmt(self, f)
            }
        }
    };
}

macro_rules! impl_float_column_value {
    ($t:ty, $variant:ident) => {
        impl ColumnValue for $t {
            const DATA_TYPE: DataType = DataType::$variant;

            #[inline]
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn try_from_value(value: Value) -> Result<Self, ColumnError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch::<Self>(&other)),
                }
            }

            #[inline]
            fn value_eq(&self, other: &Self) -> bool {
                self.to_bits() == other.to_bits()
            }

            #[inline]
            fn value_hash<H: Hasher>(&self, state: &mut H) {
                self.to_bits().hash(state)
            }

            fn fmt_value(&self, f: &mut Formatter<'_>) -> fmt::Result {
                Display::fmt(self, f)
            }
        }
    };
}

impl_column_value!(i8, I8);
impl_column_value!(i16, I16);
impl_column_value!(i32, I32);
impl_column_value!(i64, I64);
impl_column_value!(Ipv6Addr, Ipv6);
impl_float_column_value!(f32, F32);
impl_float_column_value!(f64, F64);

impl ColumnValue for String {
    const DATA_TYPE: DataType = DataType::String;

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn try_from_value(value: Value) -> Result<Self, ColumnError> {
        match value {
            Value::String(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    #[inline]
    fn value_eq(&self, other: &Self) -> bool {
        self == other
    }

    #[inline]
    fn value_hash<H: Hasher>(&self, state: &mut H) {
        self.hash(state)
    }

    fn heap_size(&self) -> usize {
        self.len()
    }

    fn fmt_value(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self)
    }
}

impl ColumnValue for Vec<u8> {
    const DATA_TYPE: DataType = DataType::Bytes;

    fn into_value(self) -> Value {
        Value::Bytes(self)
    }

    fn try_from_value(value: Value) -> Result<Self, ColumnError> {
        match value {
            Value::Bytes(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    #[inline]
    fn value_eq(&self, other: &Self) -> bool {
        self == other
    }

    #[inline]
    fn value_hash<H: Hasher>(&self, state: &mut H) {
        self.hash(state)
    }

    fn heap_size(&self) -> usize {
        self.len()
    }

    fn fmt_value(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for byte in self {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[derive(Clone)]
/// A map key wrapper which hashes and compares a value using the
/// [ColumnValue] total equality.
pub struct ValueKey<T>(pub T);

impl<T: ColumnValue> PartialEq for ValueKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.value_eq(&other.0)
    }
}

impl<T: ColumnValue> Eq for ValueKey<T> {}

impl<T: ColumnValue> Hash for ValueKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.value_hash(state)
    }
}

impl<T: Debug> Debug for ValueKey<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        <T as Debug>::fmt(&self.0, f)
    }
}

/// Display adapter for a single column value.
pub(crate) struct DisplayValue<'a, T>(pub &'a T);

impl<T: ColumnValue> Display for DisplayValue<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt_value(f)
    }
}
