use std::io;

use crate::column::Tid;
use crate::types::DataType;

#[derive(Debug, thiserror::Error)]
/// An error that can occur when reading, mutating or persisting a column.
pub enum ColumnError {
    #[error("Type mismatch: column stores {expected} but got {actual}")]
    /// The runtime type of the provided value does not match the
    /// declared value type of the column.
    ///
    /// The column is left untouched.
    TypeMismatch {
        expected: DataType,
        actual: DataType,
    },
    #[error("TID {tid} is out of range for column of length {len}")]
    /// The target position does not exist in the column.
    OutOfRange { tid: Tid, len: usize },
    #[error("Position list must be sorted in strictly ascending order")]
    /// A bulk removal was given positions which were not sorted
    /// in strictly ascending order.
    UnsortedPositions,
    #[error("IO Error: {0}")]
    /// An IO error that occurred while storing or loading the column.
    IoError(#[from] io::Error),
    #[error("Encode Error: {0}")]
    /// The column state could not be serialized.
    EncodeError(#[from] rmp_serde::encode::Error),
    #[error("Decode Error: {0}")]
    /// The stored archive could not be deserialized.
    DecodeError(#[from] rmp_serde::decode::Error),
    #[error("Column Corrupted: {0}")]
    /// The decoded state breaks one of the codec invariants.
    ///
    /// This should never occur unless the archive was written by a different
    /// version or was tampered with.
    Corrupted(String),
}

impl ColumnError {
    pub(crate) fn out_of_range(tid: Tid, len: usize) -> Self {
        Self::OutOfRange { tid, len }
    }
}
