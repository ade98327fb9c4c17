//! Whole-file rewrite through a sibling temp file.
//!
//! The new rows are written to the temp path, flushed and fsynced, then renamed
//! over the live file in a single step. Readers see either the old or the new
//! table, never a truncated one. The live file is never removed first.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, warn};

use super::error::StoreResult;

/// Replaces `path` with exactly `records` (header included).
///
/// If writing the temp file fails, `path` is left as it was and the temp file
/// is removed. An error from the rename itself also leaves `path` intact. A
/// failed directory fsync after the rename is logged, not returned.
pub fn replace_file(path: &Path, temp_path: &Path, records: &[StringRecord]) -> StoreResult<()> {
    replace_with(path, temp_path, records, sync_parent_dir)
}

fn replace_with(
    path: &Path,
    temp_path: &Path,
    records: &[StringRecord],
    sync_dir: impl FnOnce(&Path) -> io::Result<()>,
) -> StoreResult<()> {
    if let Err(e) = write_synced(temp_path, records) {
        if let Err(cleanup) = fs::remove_file(temp_path) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!(path = %temp_path.display(), error = %cleanup, "failed to remove temp file");
            }
        }
        return Err(e);
    }

    fs::rename(temp_path, path)?;
    // The new contents are already in place; only durability of the rename is at stake.
    if let Err(e) = sync_dir(path) {
        warn!(path = %path.display(), error = %e, "directory fsync failed after rename");
    }

    debug!(path = %path.display(), rows = records.len(), "file replaced");
    Ok(())
}

fn write_synced(temp_path: &Path, records: &[StringRecord]) -> StoreResult<()> {
    let file = File::create(temp_path)?;
    // The header row may have any width; data rows are shape-checked on read.
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Makes the rename durable by syncing the directory entry.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => File::open(dir)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::StoreError;

    fn rows(lines: &[&[&str]]) -> Vec<StringRecord> {
        lines.iter().map(|l| StringRecord::from(l.to_vec())).collect()
    }

    #[test]
    fn replaces_contents_and_consumes_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        let temp = dir.path().join("data_temp.csv");
        fs::write(&path, "old,contents\n").unwrap();

        replace_file(&path, &temp, &rows(&[&["h1", "h2"], &["a", "b,c"]])).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "h1,h2\na,\"b,c\"\n");
        assert!(!temp.exists());
    }

    #[test]
    fn creates_target_when_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        let temp = dir.path().join("data_temp.csv");

        replace_file(&path, &temp, &rows(&[&["only"]])).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "only\n");
    }

    #[test]
    fn failed_temp_write_leaves_original_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        fs::write(&path, "keep,me\n").unwrap();
        let temp = dir.path().join("missing-dir").join("data_temp.csv");

        let err = replace_file(&path, &temp, &rows(&[&["new"]])).unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep,me\n");
    }

    #[test]
    fn rows_of_different_widths_are_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        let temp = dir.path().join("data_temp.csv");

        replace_file(&path, &temp, &rows(&[&["whatever"], &["u1", "Ann", "a@x.com"]])).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "whatever\nu1,Ann,a@x.com\n");
    }

    #[test]
    fn directory_sync_failure_after_rename_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        let temp = dir.path().join("data_temp.csv");
        fs::write(&path, "old\n").unwrap();

        replace_with(&path, &temp, &rows(&[&["new"]]), |_| {
            Err(io::Error::other("fsync not supported"))
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert!(!temp.exists());
    }

    #[test]
    fn overwrites_stale_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.csv");
        let temp = dir.path().join("data_temp.csv");
        fs::write(&temp, "leftover from a crash, much longer than the new body\n").unwrap();

        replace_file(&path, &temp, &rows(&[&["x", "y"]])).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "x,y\n");
        assert!(!temp.exists());
    }
}
