//! Store directory management.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK              # advisory lock for single-process access
//! ├─ docs.log          # document log
//! ├─ docs.log.compact  # compaction output, only while compacting
//! └─ docs.log.torn     # torn tails cut off during recovery
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "docs.log";
const COMPACT_FILE: &str = "docs.log.compact";
const TORN_FILE: &str = "docs.log.torn";

/// An opened store directory.
///
/// Holds an exclusive lock on `LOCK` for as long as it lives, so only one
/// `StoreDir` (and one process) can use a directory at a time.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - `InvalidLocation` if the directory is missing and
    ///   `create_if_missing` is false, or the path is not a directory
    /// - `DatabaseLocked` if another handle holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_location(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_location(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the document log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Returns the path compaction writes to before renaming.
    #[must_use]
    pub fn compact_path(&self) -> PathBuf {
        self.path.join(COMPACT_FILE)
    }

    /// Returns the path torn log tails are kept in.
    #[must_use]
    pub fn torn_path(&self) -> PathBuf {
        self.path.join(TORN_FILE)
    }

    /// Appends bytes cut from the end of the log to the torn-tail file and
    /// syncs it, so recovery never destroys them.
    pub fn preserve_torn_tail(&self, bytes: &[u8]) -> CoreResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.torn_path())?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }

    /// Whether the directory holds no document log yet.
    #[must_use]
    pub fn is_new(&self) -> bool {
        !self.log_path().exists()
    }

    /// Deletes compaction output left behind by a crash.
    ///
    /// The log is only replaced by an atomic rename, so a leftover file is
    /// never the authoritative copy.
    pub fn remove_stale_compaction(&self) -> CoreResult<bool> {
        let path = self.compact_path();
        if path.exists() {
            fs::remove_file(&path)?;
            tracing::warn!(path = %path.display(), "removed stale compaction output");
            return Ok(true);
        }
        Ok(false)
    }

    /// Syncs the directory so renames and new files are durable.
    #[cfg(unix)]
    pub fn sync(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Directory sync is not available on this platform; the file system
    /// journal covers metadata.
    #[cfg(not(unix))]
    pub fn sync(&self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_new_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");

        let dir = StoreDir::open(&path, true).unwrap();
        assert!(path.is_dir());
        assert!(path.join(LOCK_FILE).exists());
        assert!(dir.is_new());
        assert_eq!(dir.log_path(), path.join("docs.log"));
    }

    #[test]
    fn missing_directory_without_create() {
        let temp = tempdir().unwrap();
        let result = StoreDir::open(&temp.path().join("absent"), false);
        assert!(matches!(result, Err(CoreError::InvalidLocation { .. })));
    }

    #[test]
    fn file_path_is_rejected() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            StoreDir::open(&file, true),
            Err(CoreError::InvalidLocation { .. })
        ));
    }

    #[test]
    fn second_open_is_locked() {
        let temp = tempdir().unwrap();
        let _held = StoreDir::open(temp.path(), true).unwrap();
        assert!(matches!(
            StoreDir::open(temp.path(), true),
            Err(CoreError::DatabaseLocked)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        drop(StoreDir::open(temp.path(), true).unwrap());
        assert!(StoreDir::open(temp.path(), true).is_ok());
    }

    #[test]
    fn stale_compaction_output_is_removed() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true).unwrap();
        assert!(!dir.remove_stale_compaction().unwrap());
        fs::write(dir.compact_path(), b"partial").unwrap();
        assert!(dir.remove_stale_compaction().unwrap());
        assert!(!dir.compact_path().exists());
    }
}
