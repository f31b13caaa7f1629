use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tarp_column::harness::{Harness, HarnessError, HarnessOptions, HarnessValue};
use tarp_column::{
    AnyColumn,
    Column,
    ColumnOptions,
    ColumnValue,
    DataType,
    Encoding,
    UncompressedColumn,
};
use tracing::{error, info};

/// Runs `$body` with `$t` aliased to the element type of the given [DataType].
macro_rules! with_value_type {
    ($data_type:expr, $t:ident => $body:expr) => {
        match $data_type {
            DataType::String => {
                type $t = String;
                $body
            },
            DataType::I8 => {
                type $t = i8;
                $body
            },
            DataType::I16 => {
                type $t = i16;
                $body
            },
            DataType::I32 => {
                type $t = i32;
                $body
            },
            DataType::I64 => {
                type $t = i64;
                $body
            },
            DataType::F32 => {
                type $t = f32;
                $body
            },
            DataType::F64 => {
                type $t = f64;
                $body
            },
            DataType::Bytes => {
                type $t = Vec<u8>;
                $body
            },
            DataType::Ipv6 => {
                type $t = std::net::Ipv6Addr;
                $body
            },
        }
    };
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check every codec against the uncompressed reference using random
    /// operation sequences.
    Selftest {
        #[arg(long, env = "TARP_SEED", default_value_t = 0)]
        /// The seed of the first operation sequence.
        seed: u64,
        #[arg(long, env = "TARP_OPS", default_value_t = 1_000)]
        /// The number of operations applied per run.
        ops: usize,
        #[arg(long, default_value_t = 4)]
        /// The number of seeds to run, starting at `--seed`.
        runs: u64,
        #[arg(long)]
        /// The encodings to check, defaults to every compressed encoding.
        ///
        /// Can be passed multiple times.
        encoding: Vec<Encoding>,
    },
    /// Encode a file with one value per line into a stored column.
    Encode {
        #[arg(short, long)]
        /// The input file, each line is parsed as a single value.
        input: PathBuf,
        #[arg(long, env = "TARP_DATA_PATH")]
        /// The directory to store the column in.
        dir: PathBuf,
        #[arg(long)]
        /// The name of the column, this is also its file name.
        name: String,
        #[arg(long, default_value_t = Encoding::Dictionary)]
        /// The encoding of the column.
        encoding: Encoding,
        #[arg(long, default_value_t = DataType::String)]
        /// The value type of the column.
        data_type: DataType,
    },
    /// Load a stored column and report its size.
    Inspect {
        #[arg(long, env = "TARP_DATA_PATH")]
        /// The directory the column is stored in.
        dir: PathBuf,
        #[arg(long)]
        /// The name of the column.
        name: String,
        #[arg(long, default_value_t = Encoding::Dictionary)]
        /// The encoding the column was stored with.
        encoding: Encoding,
        #[arg(long, default_value_t = DataType::String)]
        /// The value type of the column.
        data_type: DataType,
        #[arg(long)]
        /// Print every value of the column to stdout.
        print: bool,
    },
}

impl Commands {
    /// Triggers any additional startup messages which are aware
    /// of the provided subcommand.
    pub fn display_startup_message(&self) {
        match self {
            Commands::Selftest {
                seed,
                ops,
                runs,
                ..
            } => {
                info!(seed = seed, ops = ops, runs = runs, "Running codec self test");
            },
            Commands::Encode {
                input,
                dir,
                name,
                encoding,
                data_type,
            } => {
                info!(
                    input = %input.display(),
                    dir = %dir.display(),
                    name = %name,
                    encoding = %encoding,
                    data_type = %data_type,
                    "Encoding column",
                );
            },
            Commands::Inspect { dir, name, .. } => {
                info!(dir = %dir.display(), name = %name, "Inspecting column");
            },
        }
    }

    /// Executes the command
    pub fn execute(self) -> Result<()> {
        match self {
            Commands::Selftest {
                seed,
                ops,
                runs,
                encoding,
            } => {
                let encodings = if encoding.is_empty() {
                    Encoding::COMPRESSED.to_vec()
                } else {
                    encoding
                };
                selftest(seed, ops, runs, &encodings)
            },
            Commands::Encode {
                input,
                dir,
                name,
                encoding,
                data_type,
            } => {
                let options = ColumnOptions::builder()
                    .name(name)
                    .encoding(encoding)
                    .data_type(data_type)
                    .build();
                with_value_type!(data_type, T => encode::<T>(&input, &dir, options).map(|_| ()))
            },
            Commands::Inspect {
                dir,
                name,
                encoding,
                data_type,
                print,
            } => {
                let options = ColumnOptions::builder()
                    .name(name)
                    .encoding(encoding)
                    .data_type(data_type)
                    .build();
                with_value_type!(data_type, T => inspect::<T>(&dir, options, print).map(|_| ()))
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Size information about a column.
struct ColumnSummary {
    len: usize,
    bytes: usize,
    uncompressed_bytes: usize,
}

impl ColumnSummary {
    fn of<T: ColumnValue>(column: &AnyColumn<T>) -> Self {
        let mut reference = UncompressedColumn::new(column.name());
        reference.insert_many(column.to_vec());

        Self {
            len: column.len(),
            bytes: column.size_in_bytes(),
            uncompressed_bytes: reference.size_in_bytes(),
        }
    }

    fn ratio(&self) -> f64 {
        if self.uncompressed_bytes == 0 {
            return 1.0;
        }
        self.bytes as f64 / self.uncompressed_bytes as f64
    }
}

fn selftest(seed: u64, ops: usize, runs: u64, encodings: &[Encoding]) -> Result<()> {
    let dir = tempfile::tempdir().context("Create scratch directory")?;
    let mut failures = 0;

    for seed in seed..seed.saturating_add(runs) {
        let harness = Harness::new(HarnessOptions::builder().seed(seed).ops(ops).build());
        for &encoding in encodings {
            failures += check_codec::<i64>(&harness, encoding, dir.path())?;
            failures += check_codec::<f64>(&harness, encoding, dir.path())?;
            failures += check_codec::<String>(&harness, encoding, dir.path())?;
        }
    }

    if failures > 0 {
        bail!("{failures} self test run(s) diverged from the reference");
    }

    info!("All codecs match the reference");
    Ok(())
}

/// Returns the number of failed runs, `0` or `1`.
fn check_codec<T: HarnessValue>(
    harness: &Harness,
    encoding: Encoding,
    directory: &Path,
) -> Result<usize> {
    let mut column = AnyColumn::<T>::new(T::DATA_TYPE.name(), encoding);
    match harness.run(&mut column, directory) {
        Ok(report) => {
            info!(
                encoding = %encoding,
                data_type = %T::DATA_TYPE,
                len = report.final_len,
                ratio = report.compression_ratio().unwrap_or(1.0),
                "Codec passed",
            );
            Ok(0)
        },
        Err(HarnessError::Diverged { step, op, reason }) => {
            error!(
                encoding = %encoding,
                data_type = %T::DATA_TYPE,
                step = step,
                op = %op,
                "Codec diverged: {reason}",
            );
            Ok(1)
        },
        Err(other) => Err(other).context("Run harness"),
    }
}

fn encode<T: ColumnValue>(
    input: &Path,
    dir: &Path,
    options: ColumnOptions,
) -> Result<ColumnSummary> {
    let data_type = T::DATA_TYPE;
    let mut column = AnyColumn::<T>::create(options)?;

    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("Read input file {}", input.display()))?;
    for (line_no, line) in contents.lines().enumerate() {
        let value = data_type.parse_value(line).with_context(|| {
            format!("Parse line {} as {data_type}: {line:?}", line_no + 1)
        })?;
        column.insert_value(value)?;
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Create data directory {}", dir.display()))?;
    column.store(dir).context("Store column")?;

    let summary = ColumnSummary::of(&column);
    info!(
        name = column.name(),
        encoding = %column.encoding(),
        len = summary.len,
        bytes = summary.bytes,
        uncompressed_bytes = summary.uncompressed_bytes,
        ratio = summary.ratio(),
        "Stored column",
    );

    Ok(summary)
}

fn inspect<T: ColumnValue>(
    dir: &Path,
    options: ColumnOptions,
    print: bool,
) -> Result<ColumnSummary> {
    let mut column = AnyColumn::<T>::create(options)?;
    column
        .load(dir)
        .with_context(|| format!("Load column {:?} from {}", column.name(), dir.display()))?;

    let summary = ColumnSummary::of(&column);
    info!(
        name = column.name(),
        encoding = %column.encoding(),
        data_type = %column.data_type(),
        len = summary.len,
        bytes = summary.bytes,
        uncompressed_bytes = summary.uncompressed_bytes,
        ratio = summary.ratio(),
        "Loaded column",
    );

    if print {
        print!("{column}");
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn test_parse_encode_args() {
        let cli = Cli::try_parse_from([
            "tarp",
            "encode",
            "--input",
            "values.txt",
            "--dir",
            "data",
            "--name",
            "cities",
            "--encoding",
            "run-length",
            "--data-type",
            "i32",
        ])
        .expect("Parse args");

        match cli.command {
            Commands::Encode {
                encoding,
                data_type,
                name,
                ..
            } => {
                assert_eq!(encoding, Encoding::RunLength);
                assert_eq!(data_type, DataType::I32);
                assert_eq!(name, "cities");
            },
            other => panic!("Unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_encoding() {
        let result = Cli::try_parse_from(["tarp", "selftest", "--encoding", "zip"]);
        assert!(result.is_err());
    }

    #[rstest::rstest]
    #[case(Encoding::Dictionary)]
    #[case(Encoding::RunLength)]
    #[case(Encoding::BitVector)]
    fn test_encode_then_inspect(#[case] encoding: Encoding) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("values.txt");
        std::fs::write(&input, "7\n7\n7\n-1\n7\n").unwrap();

        let options = || {
            ColumnOptions::builder()
                .name("numbers")
                .encoding(encoding)
                .data_type(DataType::I16)
                .build()
        };

        let data = dir.path().join("data");
        let stored = encode::<i16>(&input, &data, options()).expect("Encode column");
        assert_eq!(stored.len, 5);
        assert!(data.join("numbers").exists());

        let loaded = inspect::<i16>(&data, options(), false).expect("Inspect column");
        assert_eq!(stored, loaded);
    }

    #[test]
    fn test_encode_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("values.txt");
        std::fs::write(&input, "1\ntwo\n").unwrap();

        let options = ColumnOptions::builder().name("numbers").build();
        let err = encode::<i64>(&input, dir.path(), options).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_inspect_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let options = ColumnOptions::builder().name("nothing").build();
        assert!(inspect::<String>(dir.path(), options, false).is_err());
    }

    #[test]
    fn test_selftest_passes() {
        selftest(5, 150, 2, &Encoding::ALL).expect("Self test");
    }
}
