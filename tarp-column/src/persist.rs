//! Opaque archive IO shared by all columns.
//!
//! A column is written to `<directory>/<column name>` with no extension and
//! no header, the payload is the column's internal structures encoded as
//! MessagePack. Archives are only readable by the same structure version.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::error::ColumnError;

/// Returns the archive path of the named column within the directory.
pub(crate) fn archive_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(name)
}

/// Writes the payload to the archive of the named column.
pub(crate) fn write_archive<S>(
    directory: &Path,
    name: &str,
    payload: &S,
) -> Result<(), ColumnError>
where
    S: Serialize + ?Sized,
{
    let path = archive_path(directory, name);
    trace!(path = %path.display(), "Writing column archive");

    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    rmp_serde::encode::write(&mut writer, payload)?;
    writer.flush()?;

    Ok(())
}

/// Reads the payload from the archive of the named column.
pub(crate) fn read_archive<D>(directory: &Path, name: &str) -> Result<D, ColumnError>
where
    D: DeserializeOwned,
{
    let path = archive_path(directory, name);
    trace!(path = %path.display(), "Reading column archive");

    let file = File::open(&path)?;
    let payload = rmp_serde::decode::from_read(BufReader::new(file))?;

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_path_has_no_extension() {
        let path = archive_path(Path::new("/tmp/data"), "prices");
        assert_eq!(path, PathBuf::from("/tmp/data/prices"));
    }

    #[test]
    fn test_archive_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let payload = (vec!["a".to_string(), "b".to_string()], vec![0u32, 1, 0]);
        write_archive(dir.path(), "col", &payload).expect("Write archive");

        let loaded: (Vec<String>, Vec<u32>) =
            read_archive(dir.path(), "col").expect("Read archive");
        assert_eq!(loaded, payload);
    }

    #[test]
    fn test_read_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_archive::<Vec<u32>>(dir.path(), "missing");
        assert!(matches!(result, Err(ColumnError::IoError(_))));
    }

    #[test]
    fn test_read_truncated_archive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("col"), [0x93, 0x01]).unwrap();
        let result = read_archive::<Vec<u32>>(dir.path(), "col");
        assert!(matches!(result, Err(ColumnError::DecodeError(_))));
    }
}
