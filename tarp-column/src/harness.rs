//! Randomised equivalence checks between a column and the uncompressed
//! reference.
//!
//! The harness replays a seeded sequence of mutations against both columns
//! and compares every position after each step, along with the codec
//! invariants reported by [Column::validate]. The same seed always
//! produces the same sequence, so a divergence can be replayed exactly.

use std::path::Path;

use bon::Builder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument, trace};

use crate::column::{Column, Tid};
use crate::error::ColumnError;
use crate::types::{ColumnValue, DisplayValue};
use crate::uncompressed::UncompressedColumn;

const WORDS: &[&str] = &["", "apple", "banana", "cherry", "damson", "elder"];

/// A [ColumnValue] the harness knows how to generate.
pub trait HarnessValue: ColumnValue {
    /// Produces a random value from a small domain so that repeats occur.
    fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

impl HarnessValue for i32 {
    fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        rng.gen_range(-3..=3)
    }
}

impl HarnessValue for i64 {
    fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.gen_range(0..8) {
            0 => i64::MIN,
            1 => i64::MAX,
            n => n - 4,
        }
    }
}

impl HarnessValue for f64 {
    fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.gen_range(0..7) {
            0 => f64::NAN,
            1 => -0.0,
            2 => f64::INFINITY,
            n => n as f64 * 0.25,
        }
    }
}

impl HarnessValue for String {
    fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        WORDS[rng.gen_range(0..WORDS.len())].to_string()
    }
}

#[derive(Debug, Clone)]
/// A single mutation applied to both columns.
pub enum Op<T> {
    Insert(T),
    InsertMany(Vec<T>),
    Update(Tid, T),
    UpdateMany(Vec<Tid>, T),
    Remove(Tid),
    RemoveMany(Vec<Tid>),
    Clear,
}

impl<T: HarnessValue> Op<T> {
    /// Generates an operation which is valid for a column of length `len`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Self {
        if len == 0 {
            return if rng.gen_bool(0.5) {
                Op::Insert(T::generate(rng))
            } else {
                Op::InsertMany(generate_values(rng))
            };
        }

        match rng.gen_range(0..100) {
            0..=29 => Op::Insert(T::generate(rng)),
            30..=39 => Op::InsertMany(generate_values(rng)),
            40..=59 => Op::Update(rng.gen_range(0..len), T::generate(rng)),
            60..=67 => {
                let count = rng.gen_range(1..=len.min(6));
                let tids = (0..count).map(|_| rng.gen_range(0..len)).collect();
                Op::UpdateMany(tids, T::generate(rng))
            },
            68..=87 => Op::Remove(rng.gen_range(0..len)),
            88..=98 => {
                let count = rng.gen_range(1..=len.min(6));
                let mut tids = rand::seq::index::sample(rng, len, count).into_vec();
                tids.sort_unstable();
                Op::RemoveMany(tids)
            },
            _ => Op::Clear,
        }
    }

    /// Applies the operation to the given column.
    pub fn apply<C: Column<T>>(&self, column: &mut C) -> Result<(), ColumnError> {
        match self {
            Op::Insert(value) => column.insert(value.clone()),
            Op::InsertMany(values) => column.insert_many(values.iter().cloned()),
            Op::Update(tid, value) => column.update(*tid, value.clone())?,
            Op::UpdateMany(tids, value) => column.update_many(tids, value.clone())?,
            Op::Remove(tid) => column.remove(*tid)?,
            Op::RemoveMany(tids) => column.remove_many(tids)?,
            Op::Clear => column.clear(),
        }
        Ok(())
    }
}

fn generate_values<T: HarnessValue, R: Rng + ?Sized>(rng: &mut R) -> Vec<T> {
    let count = rng.gen_range(1..=12);
    let mut values = Vec::with_capacity(count);
    // Long repeats give the run-length codec something to merge.
    while values.len() < count {
        let value = T::generate(rng);
        let repeat = rng.gen_range(1..=4).min(count - values.len());
        values.extend(std::iter::repeat(value).take(repeat));
    }
    values
}

#[derive(Debug, Clone, Builder)]
/// Options for a harness run.
pub struct HarnessOptions {
    #[builder(default)]
    /// The seed of the operation sequence.
    pub seed: u64,
    #[builder(default = 1_000)]
    /// The number of operations to apply.
    pub ops: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The outcome of a successful harness run.
pub struct HarnessReport {
    /// The number of operations applied.
    pub ops_applied: usize,
    /// The length of both columns after the last operation.
    pub final_len: usize,
    /// The estimated size of the column under test.
    pub column_bytes: usize,
    /// The estimated size of the uncompressed reference.
    pub reference_bytes: usize,
}

impl HarnessReport {
    /// The size of the column under test relative to the reference.
    ///
    /// Returns `None` if the reference is empty.
    pub fn compression_ratio(&self) -> Option<f64> {
        if self.reference_bytes == 0 {
            return None;
        }
        Some(self.column_bytes as f64 / self.reference_bytes as f64)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Column diverged from the reference at step {step} ({op}): {reason}")]
    /// The column under test no longer matches the reference.
    Diverged {
        step: usize,
        op: String,
        reason: String,
    },
    #[error("Column error: {0}")]
    /// The column returned an error outside of the operation sequence.
    Column(#[from] ColumnError),
}

/// Drives a column and the uncompressed reference through the same
/// operations.
pub struct Harness {
    options: HarnessOptions,
}

impl Harness {
    /// Creates a new harness with the given options.
    pub fn new(options: HarnessOptions) -> Self {
        Self { options }
    }

    #[instrument(skip_all, fields(column = column.name(), seed = self.options.seed))]
    /// Runs the operation sequence against `column`.
    ///
    /// The column may already contain values, the reference starts as a copy
    /// of them. Once all operations are applied the column is stored to
    /// `directory` and loaded back into a fresh copy, which must match the
    /// reference as well.
    pub fn run<T, C>(
        &self,
        column: &mut C,
        directory: &Path,
    ) -> Result<HarnessReport, HarnessError>
    where
        T: HarnessValue,
        C: Column<T>,
    {
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let mut reference = UncompressedColumn::new(column.name());
        reference.insert_many(column.to_vec());
        check(&reference, column, 0, &format_args!("initial"))?;

        for step in 1..=self.options.ops {
            let op = Op::<T>::generate(&mut rng, reference.len());
            trace!(step, op = ?op, "apply");

            let expected = op.apply(&mut reference);
            let actual = op.apply(column);
            if expected.is_ok() != actual.is_ok() {
                return Err(HarnessError::Diverged {
                    step,
                    op: format!("{op:?}"),
                    reason: format!("reference returned {expected:?}, column returned {actual:?}"),
                });
            }

            check(&reference, column, step, &op)?;
        }

        column.store(directory)?;
        let mut restored = column.copy();
        restored.clear();
        restored.load(directory)?;
        check(&reference, &restored, self.options.ops, &format_args!("store/load"))?;

        let report = HarnessReport {
            ops_applied: self.options.ops,
            final_len: reference.len(),
            column_bytes: column.size_in_bytes(),
            reference_bytes: reference.size_in_bytes(),
        };
        debug!(report = ?report, "harness completed");

        Ok(report)
    }
}

fn check<T, C>(
    reference: &UncompressedColumn<T>,
    column: &C,
    step: usize,
    op: &dyn std::fmt::Debug,
) -> Result<(), HarnessError>
where
    T: ColumnValue,
    C: Column<T>,
{
    let diverged = |reason: String| HarnessError::Diverged {
        step,
        op: format!("{op:?}"),
        reason,
    };

    if reference.len() != column.len() {
        return Err(diverged(format!(
            "length {} != reference length {}",
            column.len(),
            reference.len(),
        )));
    }

    for (tid, expected) in reference.values().iter().enumerate() {
        match column.get(tid) {
            Some(actual) if actual.value_eq(expected) => {},
            Some(actual) => {
                return Err(diverged(format!(
                    "TID {tid} holds {} but the reference holds {}",
                    DisplayValue(actual),
                    DisplayValue(expected),
                )))
            },
            None => return Err(diverged(format!("TID {tid} is missing"))),
        }
    }

    if column.get(reference.len()).is_some() {
        return Err(diverged("value returned past the end".to_string()));
    }

    if let Err(err) = column.validate() {
        return Err(diverged(format!("invariants broken: {err}")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{AnyColumn, Encoding};

    #[rstest::rstest]
    #[case(Encoding::Uncompressed)]
    #[case(Encoding::Dictionary)]
    #[case(Encoding::RunLength)]
    #[case(Encoding::BitVector)]
    fn test_harness_passes(#[case] encoding: Encoding) {
        let dir = tempfile::tempdir().unwrap();
        let harness = Harness::new(HarnessOptions::builder().seed(7).ops(400).build());

        let mut column = AnyColumn::<i64>::new("ints", encoding);
        let report = harness.run(&mut column, dir.path()).expect("Harness run");
        assert_eq!(report.ops_applied, 400);
        assert_eq!(report.final_len, column.len());

        let mut column = AnyColumn::<String>::new("words", encoding);
        harness.run(&mut column, dir.path()).expect("Harness run");

        let mut column = AnyColumn::<f64>::new("floats", encoding);
        harness.run(&mut column, dir.path()).expect("Harness run");
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut first = StdRng::seed_from_u64(42);
        let mut second = StdRng::seed_from_u64(42);
        for len in 0..50 {
            let left = format!("{:?}", Op::<i32>::generate(&mut first, len));
            let right = format!("{:?}", Op::<i32>::generate(&mut second, len));
            assert_eq!(left, right);
        }
    }

    #[test]
    fn test_generated_ops_are_valid() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut column = UncompressedColumn::<String>::new("words");
        for _ in 0..500 {
            let op = Op::generate(&mut rng, column.len());
            op.apply(&mut column).expect("Generated op should be valid");
        }
    }

    #[derive(Debug, Clone)]
    /// A column with injectable faults.
    struct FaultyColumn {
        inner: UncompressedColumn<i32>,
        /// Updates are accepted but not applied.
        forget_updates: bool,
        /// Reports broken invariants once it holds more values than this.
        capacity: usize,
    }

    impl FaultyColumn {
        fn forgetful() -> Self {
            Self {
                inner: UncompressedColumn::new("forgetful"),
                forget_updates: true,
                capacity: usize::MAX,
            }
        }

        fn capped(capacity: usize) -> Self {
            Self {
                inner: UncompressedColumn::new("capped"),
                forget_updates: false,
                capacity,
            }
        }
    }

    impl Column<i32> for FaultyColumn {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn validate(&self) -> Result<(), ColumnError> {
            if self.inner.len() > self.capacity {
                return Err(ColumnError::Corrupted(format!(
                    "{} values exceed the capacity of {}",
                    self.inner.len(),
                    self.capacity,
                )));
            }
            Ok(())
        }

        fn insert(&mut self, value: i32) {
            self.inner.insert(value)
        }

        fn get(&self, tid: Tid) -> Option<&i32> {
            self.inner.get(tid)
        }

        fn update(&mut self, tid: Tid, value: i32) -> Result<(), ColumnError> {
            if self.forget_updates && tid < self.inner.len() {
                return Ok(());
            }
            self.inner.update(tid, value)
        }

        fn remove(&mut self, tid: Tid) -> Result<(), ColumnError> {
            self.inner.remove(tid)
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn size_in_bytes(&self) -> usize {
            self.inner.size_in_bytes()
        }

        fn clear(&mut self) {
            self.inner.clear()
        }

        fn store(&self, directory: &Path) -> Result<(), ColumnError> {
            self.inner.store(directory)
        }

        fn load(&mut self, directory: &Path) -> Result<(), ColumnError> {
            self.inner.load(directory)
        }
    }

    #[test]
    fn test_divergence_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let harness = Harness::new(HarnessOptions::builder().seed(1).ops(200).build());
        let mut column = FaultyColumn::forgetful();

        let result = harness.run(&mut column, dir.path());
        assert!(
            matches!(result, Err(HarnessError::Diverged { .. })),
            "Expected divergence, got {result:?}"
        );
    }

    #[test]
    fn test_broken_invariants_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let harness = Harness::new(HarnessOptions::builder().seed(1).ops(200).build());
        let mut column = FaultyColumn::capped(8);

        match harness.run(&mut column, dir.path()) {
            Err(HarnessError::Diverged { step, reason, .. }) => {
                assert!(step > 0, "The empty column is valid");
                assert!(reason.contains("invariants broken"), "{reason}");
                assert!(reason.contains("capacity of 8"), "{reason}");
            },
            other => panic!("Expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn test_compression_ratio() {
        let report = HarnessReport {
            ops_applied: 1,
            final_len: 0,
            column_bytes: 10,
            reference_bytes: 0,
        };
        assert_eq!(report.compression_ratio(), None);

        let report = HarnessReport {
            column_bytes: 10,
            reference_bytes: 40,
            ..report
        };
        assert_eq!(report.compression_ratio(), Some(0.25));
    }
}
