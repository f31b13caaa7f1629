use std::mem::size_of;
use std::path::Path;

use tracing::{debug, instrument};

use crate::column::{impl_index_and_display, Column, Tid};
use crate::error::ColumnError;
use crate::persist;
use crate::types::ColumnValue;

#[derive(Debug, Clone)]
/// A column which stores every value as-is.
///
/// This is the reference all codecs must be indistinguishable from.
pub struct UncompressedColumn<T> {
    name: String,
    values: Vec<T>,
}

impl<T: ColumnValue> UncompressedColumn<T> {
    /// Creates a new empty column with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Returns the values of the column as a slice.
    pub fn values(&self) -> &[T] {
        &self.values
    }
}

impl<T: ColumnValue> Column<T> for UncompressedColumn<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&mut self, value: T) {
        self.values.push(value);
    }

    fn insert_many<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.values.extend(values);
    }

    fn get(&self, tid: Tid) -> Option<&T> {
        self.values.get(tid)
    }

    fn update(&mut self, tid: Tid, value: T) -> Result<(), ColumnError> {
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(tid)
            .ok_or_else(|| ColumnError::out_of_range(tid, len))?;
        *slot = value;
        Ok(())
    }

    fn remove(&mut self, tid: Tid) -> Result<(), ColumnError> {
        if tid >= self.values.len() {
            return Err(ColumnError::out_of_range(tid, self.values.len()));
        }
        self.values.remove(tid);
        Ok(())
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn size_in_bytes(&self) -> usize {
        self.values.len() * size_of::<T>()
            + self.values.iter().map(ColumnValue::heap_size).sum::<usize>()
    }

    fn clear(&mut self) {
        self.values.clear();
    }

    #[instrument(skip(self), fields(column = %self.name))]
    fn store(&self, directory: &Path) -> Result<(), ColumnError> {
        persist::write_archive(directory, &self.name, &self.values)?;
        debug!(len = self.values.len(), "Stored uncompressed column");
        Ok(())
    }

    #[instrument(skip(self), fields(column = %self.name))]
    fn load(&mut self, directory: &Path) -> Result<(), ColumnError> {
        let values: Vec<T> = persist::read_archive(directory, &self.name)?;
        debug!(len = values.len(), "Loaded uncompressed column");
        self.values = values;
        Ok(())
    }

    fn to_vec(&self) -> Vec<T> {
        self.values.clone()
    }
}

impl_index_and_display!(UncompressedColumn);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut column = UncompressedColumn::new("ints");
        column.insert_many([1i32, 2, 3, 4]);
        assert_eq!(column.len(), 4);

        column.update(1, 20).unwrap();
        column.remove(0).unwrap();
        assert_eq!(column.values(), &[20, 3, 4]);
        assert_eq!(column[2], 4);
        assert!(column.get(3).is_none());
        assert!(matches!(
            column.remove(3),
            Err(ColumnError::OutOfRange { tid: 3, len: 3 })
        ));
    }

    #[test]
    fn test_display() {
        let mut column = UncompressedColumn::new("names");
        column.insert("a".to_string());
        column.insert("b".to_string());
        assert_eq!(
            column.to_string(),
            "| names |\n________________________\n| a |\n| b |\n"
        );
    }

    #[test]
    #[should_panic(expected = "Invalid TID 0")]
    fn test_index_out_of_range_panics() {
        let column = UncompressedColumn::<i64>::new("empty");
        let _value = column[0];
    }
}
