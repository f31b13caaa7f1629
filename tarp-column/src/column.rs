use std::fmt::{self, Formatter};
use std::path::Path;

use crate::error::ColumnError;
use crate::types::{ColumnValue, DataType, DisplayValue, Value};

/// A tuple identifier, the dense zero-based logical position of a value
/// within a column.
///
/// TIDs are positions and not stable identifiers, removing a value shifts
/// every following TID down by one.
pub type Tid = usize;

/// The typed column interface shared by every codec and the uncompressed
/// baseline column.
///
/// A column is an ordered sequence of `T` indexed `0..len()`. Regardless of
/// how values are stored physically, every implementation must respond
/// exactly like a plain vector of values.
pub trait Column<T: ColumnValue>: Clone {
    /// Returns the name of the column.
    fn name(&self) -> &str;

    /// Returns the declared value type of the column.
    fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    /// Appends a value to the end of the column.
    fn insert(&mut self, value: T);

    /// Appends all values in order.
    ///
    /// Equivalent to repeated calls to [Self::insert], implementations may
    /// batch their bookkeeping.
    fn insert_many<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.insert(value);
        }
    }

    /// Returns the value at the given position or `None` if the
    /// position is out of range.
    fn get(&self, tid: Tid) -> Option<&T>;

    /// Replaces the value at the given position.
    fn update(&mut self, tid: Tid, value: T) -> Result<(), ColumnError>;

    /// Replaces the value at every given position.
    ///
    /// Updates are applied one after another against the current state.
    /// If any position is out of range, no update is applied.
    fn update_many(&mut self, tids: &[Tid], value: T) -> Result<(), ColumnError> {
        let len = self.len();
        if let Some(&tid) = tids.iter().find(|&&tid| tid >= len) {
            return Err(ColumnError::out_of_range(tid, len));
        }

        for &tid in tids {
            self.update(tid, value.clone())?;
        }

        Ok(())
    }

    /// Removes the value at the given position, shifting all following
    /// positions down by one.
    fn remove(&mut self, tid: Tid) -> Result<(), ColumnError>;

    /// Removes the values at every given position.
    ///
    /// The positions must be sorted in strictly ascending order and refer to
    /// the state of the column _before_ the call. If the list is unsorted or
    /// any position is out of range, nothing is removed.
    fn remove_many(&mut self, tids: &[Tid]) -> Result<(), ColumnError> {
        if tids.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ColumnError::UnsortedPositions);
        }

        let len = self.len();
        if let Some(&last) = tids.last() {
            if last >= len {
                return Err(ColumnError::out_of_range(last, len));
            }
        }

        // Highest first so the remaining targets keep their positions.
        for &tid in tids.iter().rev() {
            self.remove(tid)?;
        }

        Ok(())
    }

    /// Returns the number of values in the column.
    fn len(&self) -> usize;

    /// Returns if the column contains no values.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an estimate of the memory used by the physical representation.
    fn size_in_bytes(&self) -> usize;

    /// Removes all values from the column.
    fn clear(&mut self);

    /// Checks the internal invariants of the physical representation.
    ///
    /// Returns [ColumnError::Corrupted] describing the first violation.
    /// Columns which store values as-is have nothing to check.
    fn validate(&self) -> Result<(), ColumnError> {
        Ok(())
    }

    /// Returns an independent deep copy of the column.
    fn copy(&self) -> Self {
        self.clone()
    }

    /// Writes the column state to `<directory>/<name>`.
    fn store(&self, directory: &Path) -> Result<(), ColumnError>;

    /// Replaces the column state with the archive at `<directory>/<name>`.
    ///
    /// The live state is only replaced once the archive has been fully read
    /// and validated.
    fn load(&mut self, directory: &Path) -> Result<(), ColumnError>;

    /// Decodes the full column.
    fn to_vec(&self) -> Vec<T> {
        (0..self.len())
            .filter_map(|tid| self.get(tid).cloned())
            .collect()
    }

    /// Appends a dynamically typed value.
    ///
    /// Returns [ColumnError::TypeMismatch] if the value is not of the
    /// column's declared type.
    fn insert_value(&mut self, value: Value) -> Result<(), ColumnError> {
        let value = T::try_from_value(value)?;
        self.insert(value);
        Ok(())
    }

    /// Replaces the value at the given position with a dynamically typed value.
    fn update_value(&mut self, tid: Tid, value: Value) -> Result<(), ColumnError> {
        let value = T::try_from_value(value)?;
        self.update(tid, value)
    }

    /// Returns the value at the given position in its dynamic form.
    fn get_value(&self, tid: Tid) -> Option<Value> {
        self.get(tid).cloned().map(T::into_value)
    }
}

/// Returns if both columns hold the same logical sequence of values.
pub fn columns_equal<T, A, B>(a: &A, b: &B) -> bool
where
    T: ColumnValue,
    A: Column<T>,
    B: Column<T>,
{
    if a.len() != b.len() {
        return false;
    }

    (0..a.len()).all(|tid| match (a.get(tid), b.get(tid)) {
        (Some(left), Some(right)) => left.value_eq(right),
        _ => false,
    })
}

/// Writes the column as a single column table headed by its name.
pub(crate) fn fmt_column<T, C>(column: &C, f: &mut Formatter<'_>) -> fmt::Result
where
    T: ColumnValue,
    C: Column<T>,
{
    writeln!(f, "| {} |", column.name())?;
    writeln!(f, "________________________")?;
    for value in column.to_vec() {
        writeln!(f, "| {} |", DisplayValue(&value))?;
    }
    Ok(())
}

/// Implements positional indexing and [std::fmt::Display] for a column type.
///
/// Indexing out of range is a usage error and panics, use [Column::get]
/// for a soft failure.
macro_rules! impl_index_and_display {
    ($column:ident) => {
        impl<T: $crate::types::ColumnValue> std::ops::Index<$crate::column::Tid> for $column<T> {
            type Output = T;

            fn index(&self, tid: $crate::column::Tid) -> &T {
                match $crate::column::Column::get(self, tid) {
                    Some(value) => value,
                    None => panic!(
                        "Invalid TID {tid} for column {:?} of length {}",
                        $crate::column::Column::name(self),
                        $crate::column::Column::len(self),
                    ),
                }
            }
        }

        impl<T: $crate::types::ColumnValue> std::fmt::Display for $column<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                $crate::column::fmt_column(self, f)
            }
        }
    };
}

pub(crate) use impl_index_and_display;
