//! Run-length encoding.
//!
//! The column is stored as a list of `(count, value)` runs. The runs are
//! always kept canonical: every count is at least one and no two adjacent
//! runs hold the same value. Point mutations split and merge runs to keep
//! this true before returning.

use std::mem::size_of;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::column::{impl_index_and_display, Column, Tid};
use crate::error::ColumnError;
use crate::persist;
use crate::types::ColumnValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A block of `count` consecutive positions holding the same value.
pub struct Run<T> {
    pub count: usize,
    pub value: T,
}

impl<T> Run<T> {
    fn single(value: T) -> Self {
        Self { count: 1, value }
    }
}

#[derive(Debug, Clone)]
/// A run-length compressed column.
pub struct RunLengthColumn<T> {
    name: String,
    runs: Vec<Run<T>>,
    /// The sum of all run counts.
    len: usize,
}

impl<T: ColumnValue> RunLengthColumn<T> {
    /// Creates a new empty column with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runs: Vec::new(),
            len: 0,
        }
    }

    /// Returns the runs of the column.
    pub fn runs(&self) -> &[Run<T>] {
        &self.runs
    }

    /// Locates the run containing `tid`.
    ///
    /// Returns the index of the run and the offset of `tid` within it.
    fn locate(&self, tid: Tid) -> Option<(usize, usize)> {
        if tid >= self.len {
            return None;
        }

        let mut start = 0;
        for (idx, run) in self.runs.iter().enumerate() {
            let end = start + run.count;
            // Strictly greater, `end` is the first position of the next run.
            if end > tid {
                return Some((idx, tid - start));
            }
            start = end;
        }

        unreachable!("Run counts do not add up to the column length")
    }

    fn same_value(&self, left: usize, right: usize) -> bool {
        self.runs[left].value.value_eq(&self.runs[right].value)
    }

    /// Merges the run at `idx` into its right neighbour if they share a value.
    fn merge_with_next(&mut self, idx: usize) {
        if idx + 1 < self.runs.len() && self.same_value(idx, idx + 1) {
            let next = self.runs.remove(idx + 1);
            self.runs[idx].count += next.count;
            trace!(run = idx, count = self.runs[idx].count, "Merged runs");
        }
    }

    /// Merges the run at `idx` with both of its neighbours where possible.
    fn merge_neighbours(&mut self, idx: usize) {
        self.merge_with_next(idx);
        if idx > 0 {
            self.merge_with_next(idx - 1);
        }
    }
}

impl<T: ColumnValue> Column<T> for RunLengthColumn<T> {
    fn name(&self) -> &str {
        &self.name
    }

    /// Checks the runs are canonical and account for every position.
    fn validate(&self) -> Result<(), ColumnError> {
        if let Some(idx) = self.runs.iter().position(|run| run.count == 0) {
            return Err(ColumnError::Corrupted(format!("run {idx} is empty")));
        }

        if let Some(idx) = (1..self.runs.len()).find(|&idx| self.same_value(idx - 1, idx)) {
            return Err(ColumnError::Corrupted(format!(
                "runs {} and {idx} share the same value",
                idx - 1
            )));
        }

        let total: usize = self.runs.iter().map(|run| run.count).sum();
        if total != self.len {
            return Err(ColumnError::Corrupted(format!(
                "runs cover {total} positions but the column has {}",
                self.len
            )));
        }

        Ok(())
    }

    fn insert(&mut self, value: T) {
        match self.runs.last_mut() {
            Some(last) if last.value.value_eq(&value) => last.count += 1,
            _ => self.runs.push(Run::single(value)),
        }
        self.len += 1;
    }

    fn get(&self, tid: Tid) -> Option<&T> {
        let (idx, _) = self.locate(tid)?;
        Some(&self.runs[idx].value)
    }

    fn update(&mut self, tid: Tid, value: T) -> Result<(), ColumnError> {
        let (idx, offset) = self
            .locate(tid)
            .ok_or_else(|| ColumnError::out_of_range(tid, self.len))?;

        let run = &mut self.runs[idx];
        if run.value.value_eq(&value) {
            return Ok(());
        }

        let count = run.count;
        if count == 1 {
            run.value = value;
            self.merge_neighbours(idx);
        } else if offset == 0 {
            run.count -= 1;
            if idx > 0 && self.runs[idx - 1].value.value_eq(&value) {
                self.runs[idx - 1].count += 1;
            } else {
                self.runs.insert(idx, Run::single(value));
            }
        } else if offset == count - 1 {
            run.count -= 1;
            if idx + 1 < self.runs.len() && self.runs[idx + 1].value.value_eq(&value) {
                self.runs[idx + 1].count += 1;
            } else {
                self.runs.insert(idx + 1, Run::single(value));
            }
        } else {
            let right = Run {
                count: count - offset - 1,
                value: run.value.clone(),
            };
            run.count = offset;
            trace!(run = idx, left = offset, right = right.count, "Splitting run");
            self.runs
                .splice(idx + 1..idx + 1, [Run::single(value), right]);
        }

        debug_assert!(self.validate().is_ok(), "Update broke canonical form");
        Ok(())
    }

    fn remove(&mut self, tid: Tid) -> Result<(), ColumnError> {
        let (idx, _) = self
            .locate(tid)
            .ok_or_else(|| ColumnError::out_of_range(tid, self.len))?;

        if self.runs[idx].count > 1 {
            self.runs[idx].count -= 1;
        } else {
            self.runs.remove(idx);
            // The former neighbours are now adjacent.
            if idx > 0 {
                self.merge_with_next(idx - 1);
            }
        }
        self.len -= 1;

        debug_assert!(self.validate().is_ok(), "Remove broke canonical form");
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn size_in_bytes(&self) -> usize {
        self.runs
            .iter()
            .map(|run| size_of::<usize>() + size_of::<T>() + run.value.heap_size())
            .sum()
    }

    fn clear(&mut self) {
        self.runs.clear();
        self.len = 0;
    }

    #[instrument(skip(self), fields(column = %self.name))]
    fn store(&self, directory: &Path) -> Result<(), ColumnError> {
        persist::write_archive(directory, &self.name, &self.runs)?;
        debug!(len = self.len, runs = self.runs.len(), "Stored run-length column");
        Ok(())
    }

    #[instrument(skip(self), fields(column = %self.name))]
    fn load(&mut self, directory: &Path) -> Result<(), ColumnError> {
        let runs: Vec<Run<T>> = persist::read_archive(directory, &self.name)?;
        let len = runs.iter().map(|run| run.count).sum();

        let loaded = Self {
            name: self.name.clone(),
            runs,
            len,
        };
        loaded.validate()?;
        debug!(len = loaded.len, runs = loaded.runs.len(), "Loaded run-length column");

        *self = loaded;
        Ok(())
    }

    fn to_vec(&self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len);
        for run in &self.runs {
            values.extend(std::iter::repeat(run.value.clone()).take(run.count));
        }
        values
    }
}

impl_index_and_display!(RunLengthColumn);
