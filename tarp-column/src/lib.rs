//! Mutable compressed columns.
//!
//! Each codec stores a logical sequence of typed values, addressed by a dense
//! zero-based tuple identifier ([Tid]), in a compressed physical form while
//! behaving exactly like an [UncompressedColumn] for every read and write.
//!
//! - [DictionaryColumn] maps each distinct value to a compact code.
//! - [RunLengthColumn] stores maximal runs of equal values.
//! - [BitVectorColumn] keeps one presence bitmap per distinct value.
//!
//! All codecs implement the shared [Column] contract and can be used
//! interchangeably through [AnyColumn].

mod bitmap;
mod bit_vector;
mod column;
mod dictionary;
mod encoding;
mod error;
pub mod harness;
mod persist;
mod run_length;
mod types;
mod uncompressed;

pub use self::bit_vector::{BitVectorColumn, Presence};
pub use self::bitmap::BitVec;
pub use self::column::{columns_equal, Column, Tid};
pub use self::dictionary::DictionaryColumn;
pub use self::encoding::{AnyColumn, ColumnOptions, Encoding};
pub use self::error::ColumnError;
pub use self::run_length::{Run, RunLengthColumn};
pub use self::types::{ColumnValue, DataType, Value, ValueKey};
pub use self::uncompressed::UncompressedColumn;
