use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use bon::Builder;

use crate::bit_vector::BitVectorColumn;
use crate::column::{impl_index_and_display, Column, Tid};
use crate::dictionary::DictionaryColumn;
use crate::error::ColumnError;
use crate::run_length::RunLengthColumn;
use crate::types::{ColumnValue, DataType};
use crate::uncompressed::UncompressedColumn;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
/// The physical representation of a column.
pub enum Encoding {
    /// Values are stored as-is.
    Uncompressed,
    #[default]
    /// Values are replaced by codes into a dictionary of distinct values.
    Dictionary,
    /// Consecutive equal values are stored once with a repeat count.
    RunLength,
    /// Every distinct value keeps a bitmap of the positions holding it.
    BitVector,
}

impl Encoding {
    /// All encodings, the baseline first.
    pub const ALL: [Encoding; 4] = [
        Encoding::Uncompressed,
        Encoding::Dictionary,
        Encoding::RunLength,
        Encoding::BitVector,
    ];

    /// The compressed encodings.
    pub const COMPRESSED: [Encoding; 3] = [
        Encoding::Dictionary,
        Encoding::RunLength,
        Encoding::BitVector,
    ];

    /// Returns the name of the encoding.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Uncompressed => "uncompressed",
            Encoding::Dictionary => "dictionary",
            Encoding::RunLength => "run-length",
            Encoding::BitVector => "bit-vector",
        }
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uncompressed" | "none" => Ok(Encoding::Uncompressed),
            "dictionary" | "dict" => Ok(Encoding::Dictionary),
            "run-length" | "rle" => Ok(Encoding::RunLength),
            "bit-vector" | "bitmap" => Ok(Encoding::BitVector),
            _ => Err(format!("Unknown encoding: {s:?}")),
        }
    }
}

#[derive(Debug, Clone, Builder)]
/// Options used to create a new column.
pub struct ColumnOptions {
    #[builder(into)]
    /// The name of the column.
    ///
    /// This is also the file name the column is stored under.
    pub name: String,
    #[builder(default)]
    /// The physical representation of the column.
    pub encoding: Encoding,
    /// The declared value type of the column.
    ///
    /// If set, it must match the element type the column is created with.
    pub data_type: Option<DataType>,
}

#[derive(Debug, Clone)]
/// A column with any of the supported encodings.
pub enum AnyColumn<T> {
    Uncompressed(UncompressedColumn<T>),
    Dictionary(DictionaryColumn<T>),
    RunLength(RunLengthColumn<T>),
    BitVector(BitVectorColumn<T>),
}

macro_rules! dispatch {
    ($slf:expr, $column:ident => $body:expr) => {
        match $slf {
            AnyColumn::Uncompressed($column) => $body,
            AnyColumn::Dictionary($column) => $body,
            AnyColumn::RunLength($column) => $body,
            AnyColumn::BitVector($column) => $body,
        }
    };
}

impl<T: ColumnValue> AnyColumn<T> {
    /// Creates a new empty column with the given name and encoding.
    pub fn new(name: impl Into<String>, encoding: Encoding) -> Self {
        let name = name.into();
        match encoding {
            Encoding::Uncompressed => Self::Uncompressed(UncompressedColumn::new(name)),
            Encoding::Dictionary => Self::Dictionary(DictionaryColumn::new(name)),
            Encoding::RunLength => Self::RunLength(RunLengthColumn::new(name)),
            Encoding::BitVector => Self::BitVector(BitVectorColumn::new(name)),
        }
    }

    /// Creates a new empty column from the given [ColumnOptions].
    ///
    /// Returns [ColumnError::TypeMismatch] if the options declare a data
    /// type other than the one of `T`.
    pub fn create(options: ColumnOptions) -> Result<Self, ColumnError> {
        if let Some(data_type) = options.data_type {
            if data_type != T::DATA_TYPE {
                return Err(ColumnError::TypeMismatch {
                    expected: data_type,
                    actual: T::DATA_TYPE,
                });
            }
        }

        Ok(Self::new(options.name, options.encoding))
    }

    /// Returns the encoding of the column.
    pub fn encoding(&self) -> Encoding {
        match self {
            AnyColumn::Uncompressed(_) => Encoding::Uncompressed,
            AnyColumn::Dictionary(_) => Encoding::Dictionary,
            AnyColumn::RunLength(_) => Encoding::RunLength,
            AnyColumn::BitVector(_) => Encoding::BitVector,
        }
    }
}

impl<T: ColumnValue> Column<T> for AnyColumn<T> {
    fn name(&self) -> &str {
        dispatch!(self, column => column.name())
    }

    fn insert(&mut self, value: T) {
        dispatch!(self, column => column.insert(value))
    }

    fn insert_many<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        dispatch!(self, column => column.insert_many(values))
    }

    fn get(&self, tid: Tid) -> Option<&T> {
        dispatch!(self, column => column.get(tid))
    }

    fn update(&mut self, tid: Tid, value: T) -> Result<(), ColumnError> {
        dispatch!(self, column => column.update(tid, value))
    }

    fn update_many(&mut self, tids: &[Tid], value: T) -> Result<(), ColumnError> {
        dispatch!(self, column => column.update_many(tids, value))
    }

    fn remove(&mut self, tid: Tid) -> Result<(), ColumnError> {
        dispatch!(self, column => column.remove(tid))
    }

    fn remove_many(&mut self, tids: &[Tid]) -> Result<(), ColumnError> {
        dispatch!(self, column => column.remove_many(tids))
    }

    fn len(&self) -> usize {
        dispatch!(self, column => column.len())
    }

    fn size_in_bytes(&self) -> usize {
        dispatch!(self, column => column.size_in_bytes())
    }

    fn clear(&mut self) {
        dispatch!(self, column => column.clear())
    }

    fn validate(&self) -> Result<(), ColumnError> {
        dispatch!(self, column => column.validate())
    }

    fn store(&self, directory: &Path) -> Result<(), ColumnError> {
        dispatch!(self, column => column.store(directory))
    }

    fn load(&mut self, directory: &Path) -> Result<(), ColumnError> {
        dispatch!(self, column => column.load(directory))
    }

    fn to_vec(&self) -> Vec<T> {
        dispatch!(self, column => column.to_vec())
    }
}

impl_index_and_display!(AnyColumn);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::columns_equal;
    use crate::types::Value;

    #[rstest::rstest]
    #[case("dictionary", Encoding::Dictionary)]
    #[case("RLE", Encoding::RunLength)]
    #[case("bit-vector", Encoding::BitVector)]
    #[case("none", Encoding::Uncompressed)]
    fn test_encoding_from_str(#[case] raw: &str, #[case] expected: Encoding) {
        assert_eq!(raw.parse::<Encoding>().unwrap(), expected);
        assert_eq!(
            expected.to_string().parse::<Encoding>().unwrap(),
            expected,
            "Display should round trip"
        );
    }

    #[test]
    fn test_create_with_options() {
        let options = ColumnOptions::builder()
            .name("prices")
            .encoding(Encoding::RunLength)
            .data_type(DataType::F64)
            .build();
        let column = AnyColumn::<f64>::create(options).expect("Create column");
        assert_eq!(column.encoding(), Encoding::RunLength);
        assert_eq!(column.name(), "prices");
        assert_eq!(column.data_type(), DataType::F64);
    }

    #[test]
    fn test_create_default_encoding() {
        let options = ColumnOptions::builder().name("names").build();
        let column = AnyColumn::<String>::create(options).expect("Create column");
        assert_eq!(column.encoding(), Encoding::Dictionary);
    }

    #[test]
    fn test_create_rejects_wrong_data_type() {
        let options = ColumnOptions::builder()
            .name("ids")
            .data_type(DataType::String)
            .build();
        let result = AnyColumn::<i64>::create(options);
        assert!(matches!(
            result,
            Err(ColumnError::TypeMismatch {
                expected: DataType::String,
                actual: DataType::I64,
            })
        ));
    }

    #[rstest::rstest]
    #[case(Encoding::Uncompressed)]
    #[case(Encoding::Dictionary)]
    #[case(Encoding::RunLength)]
    #[case(Encoding::BitVector)]
    fn test_encodings_agree(#[case] encoding: Encoding) {
        let mut reference = UncompressedColumn::new("ref");
        let mut column = AnyColumn::new("col", encoding);

        let values = [3i32, 3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5];
        reference.insert_many(values);
        column.insert_many(values);

        mutate(&mut reference);
        mutate(&mut column);

        assert!(columns_equal(&reference, &column));
        assert_eq!(column.len(), 9);
        column.validate().unwrap();
    }

    fn mutate<C: Column<i32>>(column: &mut C) {
        column.update(0, 1).unwrap();
        column.update_many(&[4, 5, 6], 7).unwrap();
        column.remove(2).unwrap();
        column.remove_many(&[0, 3, 10]).unwrap();
        column.insert_value(Value::I32(8)).unwrap();
        assert!(column.insert_value(Value::I64(8)).is_err());
    }

    #[rstest::rstest]
    #[case(Encoding::Uncompressed)]
    #[case(Encoding::Dictionary)]
    #[case(Encoding::RunLength)]
    #[case(Encoding::BitVector)]
    fn test_store_load_through_any_column(#[case] encoding: Encoding) {
        let dir = tempfile::tempdir().unwrap();
        let mut column = AnyColumn::new("words", encoding);
        column.insert_many(["a", "b", "b", "c", "a"].map(String::from));
        column.store(dir.path()).expect("Store column");
        assert!(dir.path().join("words").exists());

        let mut loaded = AnyColumn::<String>::new("words", encoding);
        loaded.load(dir.path()).expect("Load column");
        assert!(columns_equal(&column, &loaded));
        assert_eq!(loaded[3], "c");
    }

    #[test]
    fn test_load_missing_file_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut column = AnyColumn::new("missing", Encoding::BitVector);
        column.insert(1i32);

        let result = column.load(dir.path());
        assert!(matches!(result, Err(ColumnError::IoError(_))));
        assert_eq!(column.to_vec(), vec![1]);
    }
}
