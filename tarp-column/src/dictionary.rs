//! Dictionary encoding.
//!
//! Every distinct value is assigned a code on first occurrence and the
//! column stores one code per position. Codes are never reused while the
//! column is live, superseded entries are only dropped by [DictionaryColumn::compact]
//! which also runs when the column is loaded.

use std::mem::size_of;
use std::path::Path;

use tracing::{debug, instrument, trace};

use crate::column::{impl_index_and_display, Column, Tid};
use crate::error::ColumnError;
use crate::persist;
use crate::types::{ColumnValue, ValueKey};

/// A dictionary code, as wide as a [Tid] so the code space never runs out
/// before the positions do.
type Code = usize;

#[derive(Debug, Clone)]
/// A dictionary compressed column.
pub struct DictionaryColumn<T> {
    name: String,
    /// The dictionary values indexed by their code.
    values: Vec<T>,
    /// The reverse lookup of `values`.
    codes: ahash::HashMap<ValueKey<T>, Code>,
    /// One code per logical position.
    encoded: Vec<Code>,
}

impl<T: ColumnValue> DictionaryColumn<T> {
    /// Creates a new empty column with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            codes: ahash::HashMap::default(),
            encoded: Vec::new(),
        }
    }

    fn from_parts(
        name: String,
        values: Vec<T>,
        encoded: Vec<Code>,
    ) -> Result<Self, ColumnError> {
        let mut codes = ahash::HashMap::default();
        codes.reserve(values.len());
        for (code, value) in values.iter().enumerate() {
            let previous = codes.insert(ValueKey(value.clone()), code);
            if previous.is_some() {
                return Err(ColumnError::Corrupted(format!(
                    "dictionary contains duplicate value {value:?}"
                )));
            }
        }

        let slf = Self {
            name,
            values,
            codes,
            encoded,
        };
        slf.validate()?;

        Ok(slf)
    }

    /// Returns the number of entries in the dictionary.
    ///
    /// This may include entries which are no longer referenced by any
    /// position until the column is compacted.
    pub fn cardinality(&self) -> usize {
        self.values.len()
    }

    /// Returns the minimum number of bits required to represent every
    /// code currently assigned.
    pub fn code_width(&self) -> u32 {
        match self.values.len() {
            0 | 1 => 1,
            n => usize::BITS - (n - 1).leading_zeros(),
        }
    }

    /// Returns the code stored at the given position.
    pub fn code_at(&self, tid: Tid) -> Option<Code> {
        self.encoded.get(tid).copied()
    }

    /// Returns the code assigned to the value if it is in the dictionary.
    pub fn code_of(&self, value: &T) -> Option<Code> {
        // The key needs an owned value, lookups are not on the hot path.
        self.codes.get(&ValueKey(value.clone())).copied()
    }

    /// Returns the dictionary value assigned to the code.
    pub fn decode(&self, code: Code) -> Option<&T> {
        self.values.get(code)
    }

    fn code_for(&mut self, value: T) -> Code {
        let key = ValueKey(value);
        if let Some(&code) = self.codes.get(&key) {
            return code;
        }

        let code = self.values.len();
        self.values.push(key.0.clone());
        self.codes.insert(key, code);
        trace!(code, width = self.code_width(), "Assigned dictionary code");

        code
    }

    /// Drops every dictionary entry which is no longer referenced and
    /// renumbers the remaining codes in order of first occurrence.
    ///
    /// Returns the number of entries removed.
    pub fn compact(&mut self) -> usize {
        let before = self.values.len();

        let mut remap: Vec<Option<Code>> = vec![None; before];
        let mut values = Vec::new();
        for code in self.encoded.iter_mut() {
            let slot = &mut remap[*code];
            let new_code = match *slot {
                Some(new_code) => new_code,
                None => {
                    let new_code = values.len();
                    values.push(self.values[*code].clone());
                    *slot = Some(new_code);
                    new_code
                },
            };
            *code = new_code;
        }

        self.codes.clear();
        for (code, value) in values.iter().enumerate() {
            self.codes.insert(ValueKey(value.clone()), code);
        }
        self.values = values;

        let removed = before - self.values.len();
        if removed > 0 {
            debug!(column = %self.name, removed, "Compacted dictionary");
        }
        removed
    }
}

impl<T: ColumnValue> Column<T> for DictionaryColumn<T> {
    fn name(&self) -> &str {
        &self.name
    }

    /// Checks the dictionary is a bijection and every stored code resolves.
    fn validate(&self) -> Result<(), ColumnError> {
        if self.codes.len() != self.values.len() {
            return Err(ColumnError::Corrupted(format!(
                "dictionary has {} values but {} codes",
                self.values.len(),
                self.codes.len(),
            )));
        }

        for (code, value) in self.values.iter().enumerate() {
            if self.codes.get(&ValueKey(value.clone())) != Some(&code) {
                return Err(ColumnError::Corrupted(format!(
                    "dictionary value {value:?} does not map back to code {code}"
                )));
            }
        }

        if let Some((tid, code)) = self
            .encoded
            .iter()
            .enumerate()
            .find(|&(_, &code)| code >= self.values.len())
        {
            return Err(ColumnError::Corrupted(format!(
                "TID {tid} references unknown dictionary code {code}"
            )));
        }

        Ok(())
    }

    fn insert(&mut self, value: T) {
        let code = self.code_for(value);
        self.encoded.push(code);
    }

    fn insert_many<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let values = values.into_iter();
        self.encoded.reserve(values.size_hint().0);

        let cardinality = self.values.len();
        for value in values {
            let code = self.code_for(value);
            self.encoded.push(code);
        }

        let added = self.values.len() - cardinality;
        if added > 0 {
            trace!(added, width = self.code_width(), "Extended dictionary");
        }
    }

    fn get(&self, tid: Tid) -> Option<&T> {
        let code = *self.encoded.get(tid)?;
        self.values.get(code)
    }

    fn update(&mut self, tid: Tid, value: T) -> Result<(), ColumnError> {
        if tid >= self.encoded.len() {
            return Err(ColumnError::out_of_range(tid, self.encoded.len()));
        }

        let code = self.code_for(value);
        self.encoded[tid] = code;

        Ok(())
    }

    fn remove(&mut self, tid: Tid) -> Result<(), ColumnError> {
        if tid >= self.encoded.len() {
            return Err(ColumnError::out_of_range(tid, self.encoded.len()));
        }

        self.encoded.remove(tid);

        Ok(())
    }

    fn len(&self) -> usize {
        self.encoded.len()
    }

    fn size_in_bytes(&self) -> usize {
        let dictionary_bytes: usize = self
            .values
            .iter()
            .map(|value| size_of::<T>() + size_of::<Code>() + value.heap_size())
            .sum();
        let code_bits = self.encoded.len() * self.code_width() as usize;
        dictionary_bytes + code_bits.div_ceil(8)
    }

    fn clear(&mut self) {
        self.values.clear();
        self.codes.clear();
        self.encoded.clear();
    }

    #[instrument(skip(self), fields(column = %self.name))]
    fn store(&self, directory: &Path) -> Result<(), ColumnError> {
        persist::write_archive(directory, &self.name, &(&self.values, &self.encoded))?;
        debug!(
            len = self.encoded.len(),
            cardinality = self.values.len(),
            "Stored dictionary column"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(column = %self.name))]
    fn load(&mut self, directory: &Path) -> Result<(), ColumnError> {
        let (values, encoded): (Vec<T>, Vec<Code>) =
            persist::read_archive(directory, &self.name)?;

        let mut loaded = Self::from_parts(self.name.clone(), values, encoded)?;
        loaded.compact();
        debug!(
            len = loaded.encoded.len(),
            cardinality = loaded.values.len(),
            "Loaded dictionary column"
        );

        *self = loaded;
        Ok(())
    }
}

impl_index_and_display!(DictionaryColumn);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn assert_bijection<T: ColumnValue>(column: &DictionaryColumn<T>) {
        column.validate().expect("Dictionary should be valid");
        for tid in 0..column.len() {
            let code = column.code_at(tid).unwrap();
            let value = column.decode(code).unwrap();
            assert_eq!(column.code_of(value), Some(code), "TID {tid}");
        }
    }

    #[test]
    fn test_insert_shares_codes() {
        let mut column = DictionaryColumn::new("letters");
        column.insert_many(["x", "y", "x"].map(String::from));

        assert_eq!(column.len(), 3);
        assert_eq!(column.cardinality(), 2);
        assert_eq!(column.get(0), Some(&"x".to_string()));
        assert_eq!(column.get(2), Some(&"x".to_string()));
        assert_eq!(column.get(1), Some(&"y".to_string()));
        assert_eq!(column.code_at(0), column.code_at(2));
        assert_ne!(column.code_at(0), column.code_at(1));
        assert!(column.get(3).is_none());
        assert_bijection(&column);
    }

    #[rstest::rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(2, 1)]
    #[case(3, 2)]
    #[case(4, 2)]
    #[case(5, 3)]
    #[case(256, 8)]
    #[case(257, 9)]
    fn test_code_width(#[case] distinct: i64, #[case] width: u32) {
        let mut column = DictionaryColumn::new("ints");
        column.insert_many(0..distinct);
        assert_eq!(column.code_width(), width);
    }

    #[test]
    fn test_update_reuses_and_creates_codes() {
        let mut column = DictionaryColumn::new("ints");
        column.insert_many([1i32, 2, 1, 3]);

        column.update(1, 1).unwrap();
        assert_eq!(column.code_at(1), column.code_at(0));
        assert_eq!(column.cardinality(), 3);

        column.update(3, 99).unwrap();
        assert_eq!(column.cardinality(), 4);
        assert_eq!(column.to_vec(), vec![1, 1, 1, 99]);
        assert_bijection(&column);
    }

    #[test]
    fn test_update_out_of_range_has_no_side_effects() {
        let mut column = DictionaryColumn::new("ints");
        column.insert(1i32);

        let result = column.update(1, 5);
        assert!(matches!(result, Err(ColumnError::OutOfRange { tid: 1, len: 1 })));
        assert_eq!(column.cardinality(), 1);
        assert_eq!(column.code_of(&5), None);
    }

    #[test]
    fn test_orphaned_entries_are_never_returned() {
        let mut column = DictionaryColumn::new("ints");
        column.insert_many([7i64, 8, 9]);
        column.update(1, 7).unwrap();
        column.remove(2).unwrap();

        assert_eq!(column.cardinality(), 3);
        assert_eq!(column.to_vec(), vec![7, 7]);

        let removed = column.compact();
        assert_eq!(removed, 2);
        assert_eq!(column.cardinality(), 1);
        assert_eq!(column.to_vec(), vec![7, 7]);
        assert_bijection(&column);
    }

    #[test]
    fn test_dynamic_boundary_type_mismatch() {
        let mut column = DictionaryColumn::<String>::new("names");
        column.insert_value(Value::String("a".into())).unwrap();

        let result = column.insert_value(Value::I32(1));
        assert!(matches!(result, Err(ColumnError::TypeMismatch { .. })));
        let result = column.update_value(0, Value::F64(1.0));
        assert!(matches!(result, Err(ColumnError::TypeMismatch { .. })));

        assert_eq!(column.len(), 1);
        assert_eq!(column.cardinality(), 1);
        assert_eq!(column.get_value(0), Some(Value::String("a".into())));
    }

    #[test]
    fn test_store_load_compacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut column = DictionaryColumn::new("ints");
        column.insert_many([1i32, 2, 3, 2]);
        column.update(0, 2).unwrap();
        column.store(dir.path()).expect("Store column");

        let mut loaded = DictionaryColumn::<i32>::new("ints");
        loaded.load(dir.path()).expect("Load column");
        assert_eq!(loaded.to_vec(), vec![2, 2, 3, 2]);
        assert_eq!(loaded.cardinality(), 2);
        assert_bijection(&loaded);
    }

    #[test]
    fn test_load_corrupted_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let payload = (vec![1i32, 2], vec![0usize, 5]);
        persist::write_archive(dir.path(), "ints", &payload).unwrap();

        let mut column = DictionaryColumn::new("ints");
        column.insert(42i32);
        let result = column.load(dir.path());
        assert!(matches!(result, Err(ColumnError::Corrupted(_))));
        assert_eq!(column.to_vec(), vec![42]);
    }

    #[test]
    fn test_load_duplicate_dictionary_value() {
        let dir = tempfile::tempdir().unwrap();
        let payload = (vec![1i32, 1], vec![0usize, 1]);
        persist::write_archive(dir.path(), "ints", &payload).unwrap();

        let mut column = DictionaryColumn::<i32>::new("ints");
        let result = column.load(dir.path());
        assert!(matches!(result, Err(ColumnError::Corrupted(_))));
    }

    #[test]
    fn test_codes_are_position_wide() {
        let mut column = DictionaryColumn::new("ints");
        column.insert_many(0..70_000i32);

        let last: Tid = column.code_of(&69_999).expect("Value should be encoded");
        assert_eq!(last, 69_999);
        assert_eq!(column.code_width(), 17);
        assert_eq!(column.decode(last), Some(&69_999));
        assert_bijection(&column);
    }

    #[test]
    fn test_size_in_bytes_uses_code_width() {
        let mut column = DictionaryColumn::new("ints");
        column.insert_many([1i64, 2, 1, 2, 1, 2, 1, 2]);
        // 2 entries of (i64 + code) + 8 positions * 1 bit.
        assert_eq!(column.size_in_bytes(), 2 * (8 + size_of::<usize>()) + 1);

        column.clear();
        assert_eq!(column.size_in_bytes(), 0);
        assert!(column.is_empty());
    }

    #[test]
    fn test_copy_is_independent() {
        let mut column = DictionaryColumn::new("ints");
        column.insert_many([1i32, 2]);

        let mut copy = column.copy();
        copy.update(0, 5).unwrap();
        copy.insert(6);

        assert_eq!(column.to_vec(), vec![1, 2]);
        assert_eq!(copy.to_vec(), vec![5, 2, 6]);
    }
}
