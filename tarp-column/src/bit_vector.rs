//! Bit-vector encoding.
//!
//! Every distinct value owns a presence bitmap as long as the column where
//! bit `i` is set if position `i` holds that value. The bitmaps partition
//! the positions of the column: every position is set in exactly one of them.
//!
//! Bitmaps which no longer mark any position are dropped.

use std::mem::size_of;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::bitmap::BitVec;
use crate::column::{impl_index_and_display, Column, Tid};
use crate::error::ColumnError;
use crate::persist;
use crate::types::ColumnValue;

#[derive(Debug, Clone)]
/// A distinct value and the positions holding it.
pub struct Presence<T> {
    value: T,
    bits: BitVec,
}

impl<T> Presence<T> {
    /// The value the bitmap marks.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The presence bitmap of the value.
    pub fn bits(&self) -> &BitVec {
        &self.bits
    }
}

#[derive(Serialize)]
struct PresenceRef<'a, T> {
    value: &'a T,
    words: &'a [u64],
    len: usize,
}

#[derive(Deserialize)]
struct PresenceOwned<T> {
    value: T,
    words: Vec<u64>,
    len: usize,
}

#[derive(Debug, Clone)]
/// A bit-vector compressed column.
pub struct BitVectorColumn<T> {
    name: String,
    entries: Vec<Presence<T>>,
    /// The length shared by every bitmap.
    len: usize,
}

impl<T: ColumnValue> BitVectorColumn<T> {
    /// Creates a new empty column with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            len: 0,
        }
    }

    /// Returns the presence bitmaps of the column.
    pub fn entries(&self) -> &[Presence<T>] {
        &self.entries
    }

    fn entry_of(&self, value: &T) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.value.value_eq(value))
    }

    fn owner_of(&self, tid: Tid) -> Option<usize> {
        self.entries.iter().position(|entry| entry.bits.get(tid))
    }

    fn prune_empty(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.bits.count_ones() > 0);
        if self.entries.len() != before {
            trace!(removed = before - self.entries.len(), "Dropped empty bitmaps");
        }
    }
}

impl<T: ColumnValue> Column<T> for BitVectorColumn<T> {
    fn name(&self) -> &str {
        &self.name
    }

    /// Checks every bitmap has the column length and that the bitmaps
    /// partition the positions of the column.
    fn validate(&self) -> Result<(), ColumnError> {
        if let Some(entry) = self.entries.iter().find(|entry| entry.bits.len() != self.len) {
            return Err(ColumnError::Corrupted(format!(
                "bitmap for {:?} has length {} but the column has {}",
                entry.value,
                entry.bits.len(),
                self.len,
            )));
        }

        for (idx, entry) in self.entries.iter().enumerate() {
            if self.entries[..idx]
                .iter()
                .any(|other| other.value.value_eq(&entry.value))
            {
                return Err(ColumnError::Corrupted(format!(
                    "value {:?} has more than one bitmap",
                    entry.value
                )));
            }
        }

        for word_idx in 0..self.len.div_ceil(64) {
            let mut combined = 0u64;
            for entry in &self.entries {
                let word = entry.bits.as_words()[word_idx];
                if combined & word != 0 {
                    let tid = word_idx * 64 + (combined & word).trailing_zeros() as usize;
                    return Err(ColumnError::Corrupted(format!(
                        "TID {tid} is marked by more than one value"
                    )));
                }
                combined |= word;
            }

            let bits_in_word = (self.len - word_idx * 64).min(64);
            let expected = if bits_in_word == 64 {
                u64::MAX
            } else {
                (1u64 << bits_in_word) - 1
            };
            if combined != expected {
                let tid = word_idx * 64 + (!combined & expected).trailing_zeros() as usize;
                return Err(ColumnError::Corrupted(format!(
                    "TID {tid} is not marked by any value"
                )));
            }
        }

        Ok(())
    }

    fn insert(&mut self, value: T) {
        let mut found = false;
        for entry in self.entries.iter_mut() {
            let hit = !found && entry.value.value_eq(&value);
            entry.bits.push(hit);
            found |= hit;
        }

        if !found {
            let mut bits = BitVec::with_len_all_false(self.len);
            bits.push(true);
            self.entries.push(Presence { value, bits });
        }

        self.len += 1;
    }

    fn get(&self, tid: Tid) -> Option<&T> {
        if tid >= self.len {
            return None;
        }

        let idx = self.owner_of(tid)?;
        Some(&self.entries[idx].value)
    }

    fn update(&mut self, tid: Tid, value: T) -> Result<(), ColumnError> {
        if tid >= self.len {
            return Err(ColumnError::out_of_range(tid, self.len));
        }

        let Some(owner) = self.owner_of(tid) else {
            unreachable!("TID {tid} is not marked by any bitmap");
        };
        if self.entries[owner].value.value_eq(&value) {
            return Ok(());
        }

        self.entries[owner].bits.set(tid, false);
        match self.entry_of(&value) {
            Some(idx) => self.entries[idx].bits.set(tid, true),
            None => {
                let mut bits = BitVec::with_len_all_false(self.len);
                bits.set(tid, true);
                self.entries.push(Presence { value, bits });
            },
        }

        if self.entries[owner].bits.count_ones() == 0 {
            self.entries.remove(owner);
        }

        debug_assert!(self.validate().is_ok(), "Update broke the bitmap partition");
        Ok(())
    }

    fn remove(&mut self, tid: Tid) -> Result<(), ColumnError> {
        if tid >= self.len {
            return Err(ColumnError::out_of_range(tid, self.len));
        }

        for entry in self.entries.iter_mut() {
            entry.bits.remove(tid);
        }
        self.len -= 1;

        if self.len == 0 {
            self.entries.clear();
        } else {
            self.prune_empty();
        }

        debug_assert!(self.validate().is_ok(), "Remove broke the bitmap partition");
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn size_in_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| {
                size_of::<T>() + entry.value.heap_size() + entry.bits.len().div_ceil(8)
            })
            .sum()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
    }

    #[instrument(skip(self), fields(column = %self.name))]
    fn store(&self, directory: &Path) -> Result<(), ColumnError> {
        let payload: Vec<PresenceRef<'_, T>> = self
            .entries
            .iter()
            .map(|entry| PresenceRef {
                value: &entry.value,
                words: entry.bits.as_words(),
                len: entry.bits.len(),
            })
            .collect();

        persist::write_archive(directory, &self.name, &payload)?;
        debug!(len = self.len, values = self.entries.len(), "Stored bit-vector column");
        Ok(())
    }

    #[instrument(skip(self), fields(column = %self.name))]
    fn load(&mut self, directory: &Path) -> Result<(), ColumnError> {
        let payload: Vec<PresenceOwned<T>> = persist::read_archive(directory, &self.name)?;

        let len = payload.first().map(|entry| entry.len).unwrap_or(0);
        let mut entries = Vec::with_capacity(payload.len());
        for entry in payload {
            let bits = BitVec::from_words(entry.words, entry.len).ok_or_else(|| {
                ColumnError::Corrupted(format!(
                    "bitmap for {:?} does not match its length",
                    entry.value
                ))
            })?;
            entries.push(Presence {
                value: entry.value,
                bits,
            });
        }

        let mut loaded = Self {
            name: self.name.clone(),
            entries,
            len,
        };
        loaded.validate()?;
        loaded.prune_empty();
        debug!(len = loaded.len, values = loaded.entries.len(), "Loaded bit-vector column");

        *self = loaded;
        Ok(())
    }

    fn to_vec(&self) -> Vec<T> {
        let mut slots: Vec<Option<&T>> = vec![None; self.len];
        for entry in &self.entries {
            for tid in entry.bits.iter_ones() {
                slots[tid] = Some(&entry.value);
            }
        }
        slots.into_iter().flatten().cloned().collect()
    }
}

impl_index_and_display!(BitVectorColumn);
